//! Annotation model: structured findings extracted from artifact files.
//!
//! Parsers produce annotations with whatever paths the tool wrote; the
//! normalizer rewrites them relative to the working directory before they are
//! reported.

use serde::{Deserialize, Serialize};

/// What produced the finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Generic,
    TestResult,
    LintResult,
}

/// Severity, serialized as NOTICE / WARNING / FAILURE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnnotationLevel {
    Notice,
    Warning,
    Failure,
}

/// Where in the source tree a finding points.
///
/// Lines and columns are 1-based; `0` means "unknown".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLocation {
    pub path: String,

    #[serde(default)]
    pub start_line: u64,

    #[serde(default)]
    pub end_line: u64,

    #[serde(default)]
    pub start_column: u64,

    #[serde(default)]
    pub end_column: u64,
}

impl FileLocation {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            start_line: 0,
            end_line: 0,
            start_column: 0,
            end_column: 0,
        }
    }

    pub fn with_lines(mut self, start: u64, end: u64) -> Self {
        self.start_line = start;
        self.end_line = end;
        self
    }

    pub fn with_columns(mut self, start: u64, end: u64) -> Self {
        self.start_column = start;
        self.end_column = end;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub kind: AnnotationKind,
    pub level: AnnotationLevel,
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_details: Option<String>,

    /// e.g. `pkg.SuiteTest.test_case` for test results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fully_qualified_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<FileLocation>,
}

impl Annotation {
    pub fn new(kind: AnnotationKind, level: AnnotationLevel, message: impl Into<String>) -> Self {
        Self {
            kind,
            level,
            message: message.into(),
            raw_details: None,
            fully_qualified_name: None,
            location: None,
        }
    }

    pub fn test_failure(message: impl Into<String>) -> Self {
        Self::new(AnnotationKind::TestResult, AnnotationLevel::Failure, message)
    }

    pub fn with_location(mut self, location: FileLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_raw_details(mut self, details: impl Into<String>) -> Self {
        self.raw_details = Some(details.into());
        self
    }

    pub fn with_fully_qualified_name(mut self, name: impl Into<String>) -> Self {
        self.fully_qualified_name = Some(name.into());
        self
    }

    pub fn path(&self) -> Option<&str> {
        self.location.as_ref().map(|l| l.path.as_str())
    }
}

//! Input instruction and the per-pattern resolution result.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The declarative request describing which artifact files to collect.
///
/// - `paths`: glob patterns, relative to the working directory unless absolute.
/// - `kind`: opaque type tag, forwarded verbatim in every batch header.
/// - `format`: annotation parser selector; empty means "do not parse".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactsInstruction {
    #[serde(default)]
    pub paths: Vec<String>,

    #[serde(default, rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub format: String,
}

impl ArtifactsInstruction {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            kind: String::new(),
            format: String::new(),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn wants_annotations(&self) -> bool {
        !self.format.is_empty()
    }
}

/// One glob pattern after expansion, together with everything it matched.
///
/// Created once per attempt and discarded afterwards; every entry in `paths`
/// has already passed the working-directory containment check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedPath {
    pub pattern: String,
    pub paths: Vec<PathBuf>,
}

impl ProcessedPath {
    pub fn new(pattern: impl Into<String>, paths: Vec<PathBuf>) -> Self {
        Self {
            pattern: pattern.into(),
            paths,
        }
    }
}

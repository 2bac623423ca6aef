//! Errors - エラー型と分類
//!
//! リトライ判定はエラーの同一性ではなく `ErrorKind` で行います。
//! `PathOutsideWorkingDir` だけが `Permanent`（設定ミスはリトライしても直らない）。

use std::path::PathBuf;

use thiserror::Error;

/// ErrorKind は実行エラーの分類
///
/// - Transient: 一時的なエラー（リトライ推奨）
/// - Permanent: 恒久的なエラー（リトライ無意味）
/// - Cancelled: 呼び出し側によるキャンセル（即座に巻き戻す）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Cancelled,
}

/// Failure talking to the remote artifact store or report RPC.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("upload stream already closed")]
    StreamClosed,

    #[error("remote rejected request: {0}")]
    Rejected(String),
}

/// Failure inside a format-specific annotation parser.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read report: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed report: {0}")]
    Malformed(String),
}

/// Why the normalizer discarded an annotation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("annotation path {path} is outside of {working_dir}")]
    PathOutsideWorkingDir { path: String, working_dir: String },

    #[error("annotation for {path} has an empty path after normalization")]
    EmptyPath { path: String },

    #[error("annotation for {path} has start line {start} after end line {end}")]
    InvalidLineRange { path: String, start: u64, end: u64 },
}

/// Error of one artifact-upload attempt.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("path is outside of the working directory: path {} should be relative to {}", path.display(), working_dir.display())]
    PathOutsideWorkingDir { path: PathBuf, working_dir: PathBuf },

    #[error("working directory is not set: environment has no {key}")]
    MissingWorkingDir { key: String },

    #[error("failed to list artifacts for {pattern}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("failed to list artifacts for {pattern}: {source}")]
    ListArtifacts {
        pattern: String,
        #[source]
        source: glob::GlobError,
    },

    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: TransportError,
    },

    #[error("failed to compute artifact path of {} relative to {}", path.display(), working_dir.display())]
    ArtifactPath { path: PathBuf, working_dir: PathBuf },

    #[error("failed to read artifact file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create annotations from {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("failed to report annotations: {0}")]
    Report(#[source] TransportError),

    #[error("artifact upload cancelled")]
    Cancelled,
}

impl ArtifactError {
    pub fn transport(context: impl Into<String>, source: TransportError) -> Self {
        Self::Transport {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PathOutsideWorkingDir { .. } | Self::MissingWorkingDir { .. } => {
                ErrorKind::Permanent
            }
            Self::Cancelled => ErrorKind::Cancelled,
            Self::InvalidPattern { .. }
            | Self::ListArtifacts { .. }
            | Self::Transport { .. }
            | Self::ArtifactPath { .. }
            | Self::Read { .. }
            | Self::Parse { .. }
            | Self::Report(_) => ErrorKind::Transient,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    pub fn is_path_outside_working_dir(&self) -> bool {
        matches!(self, Self::PathOutsideWorkingDir { .. })
    }
}

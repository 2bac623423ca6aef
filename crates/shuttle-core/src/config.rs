//! Config - パイプラインの設定
//!
//! すべてのフィールドに既定値があるので、空の JSON (`{}`) も有効な設定です。

use serde::{Deserialize, Serialize};

use crate::app::retry::RetryPolicy;

/// 1 MiB, also the largest payload one chunk may carry.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// 100 MiB.
pub const DEFAULT_HEFTY_ARTIFACT_THRESHOLD: u64 = 100 * 1024 * 1024;

pub const DEFAULT_WORKING_DIR_ENV: &str = "CIRRUS_WORKING_DIR";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("chunk_size must be greater than zero")]
    ZeroChunkSize,

    #[error("chunk_size must be at most {max} bytes, got {chunk_size}")]
    ChunkTooLarge { chunk_size: usize, max: usize },

    #[error("{policy}.max_attempts must be at least 1")]
    NoAttempts { policy: &'static str },

    #[error("{policy}.multiplier must be a finite number >= 1.0, got {multiplier}")]
    InvalidMultiplier { policy: &'static str, multiplier: f64 },

    #[error("working_dir_env must not be empty")]
    EmptyWorkingDirEnv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound of one chunk's payload, and the size of the session buffer.
    pub chunk_size: usize,

    /// Files above this size get an advisory progress line before transfer.
    pub hefty_artifact_threshold: u64,

    /// Applies to the whole resolve → upload → parse attempt.
    pub upload_retry: RetryPolicy,

    pub report_retry: RetryPolicy,

    /// Environment key holding the working directory.
    pub working_dir_env: String,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.chunk_size > DEFAULT_CHUNK_SIZE {
            return Err(ConfigError::ChunkTooLarge {
                chunk_size: self.chunk_size,
                max: DEFAULT_CHUNK_SIZE,
            });
        }
        validate_policy("upload_retry", &self.upload_retry)?;
        validate_policy("report_retry", &self.report_retry)?;
        if self.working_dir_env.is_empty() {
            return Err(ConfigError::EmptyWorkingDirEnv);
        }
        Ok(())
    }
}

fn validate_policy(policy: &'static str, retry: &RetryPolicy) -> Result<(), ConfigError> {
    if retry.max_attempts == 0 {
        return Err(ConfigError::NoAttempts { policy });
    }
    if !retry.multiplier.is_finite() || retry.multiplier < 1.0 {
        return Err(ConfigError::InvalidMultiplier {
            policy,
            multiplier: retry.multiplier,
        });
    }
    Ok(())
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            hefty_artifact_threshold: DEFAULT_HEFTY_ARTIFACT_THRESHOLD,
            upload_retry: RetryPolicy::two_attempts(),
            report_retry: RetryPolicy::two_attempts(),
            working_dir_env: DEFAULT_WORKING_DIR_ENV.to_string(),
        }
    }
}

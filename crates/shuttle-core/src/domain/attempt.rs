//! Attempt and Decision models for upload history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::AttemptId;

/// A single try of a retried operation (for uploads: resolve → upload → parse).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt_id: AttemptId,

    /// Policy that ran the attempt (`upload_retry` / `report_retry`).
    pub policy: String,

    /// 1-based attempt number within the policy.
    pub number: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// A decision made by a retry policy.
///
/// Records what triggered it, which policy applied, and what was decided
/// (`retry`, `give_up`, `terminal`, `drop_annotations`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub trigger: serde_json::Value,
    pub policy: String,
    pub decision: String,
    pub decided_at: DateTime<Utc>,
}

impl DecisionRecord {
    pub fn new(
        trigger: serde_json::Value,
        policy: impl Into<String>,
        decision: impl Into<String>,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self {
            trigger,
            policy: policy.into(),
            decision: decision.into(),
            decided_at,
        }
    }
}

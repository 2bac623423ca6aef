//! Outcome model: result of one `upload_artifacts` call.
//!
//! The task engine only needs `is_success()`; everything else is there so the
//! run can be explained afterwards (which attempts ran, why they were retried,
//! how many annotations made it).

use serde::{Deserialize, Serialize};

use super::attempt::{AttemptRecord, DecisionRecord};
use super::state::PipelineState;

/// SUCCESS / FAILURE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub kind: OutcomeKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Working-dir-relative paths uploaded by the successful attempt.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uploaded_files: Vec<String>,

    #[serde(default)]
    pub annotations_reported: usize,

    /// Annotations that were collected but never reached the remote side.
    #[serde(default)]
    pub annotations_dropped: usize,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<AttemptRecord>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decisions: Vec<DecisionRecord>,

    /// States the call went through, starting at `Idle`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub states: Vec<PipelineState>,
}

impl Outcome {
    pub fn success() -> Self {
        Self {
            kind: OutcomeKind::Success,
            reason: None,
            uploaded_files: Vec::new(),
            annotations_reported: 0,
            annotations_dropped: 0,
            attempts: Vec::new(),
            decisions: Vec::new(),
            states: Vec::new(),
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Failure,
            reason: Some(reason.into()),
            ..Self::success()
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Success
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_attempts(mut self, attempts: Vec<AttemptRecord>) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_decision(mut self, decision: DecisionRecord) -> Self {
        self.decisions.push(decision);
        self
    }

    pub fn with_decisions(mut self, decisions: Vec<DecisionRecord>) -> Self {
        self.decisions.extend(decisions);
        self
    }

    pub fn with_states(mut self, states: Vec<PipelineState>) -> Self {
        self.states = states;
        self
    }

    /// Final state, if the call recorded any.
    pub fn final_state(&self) -> Option<PipelineState> {
        self.states.last().copied()
    }
}

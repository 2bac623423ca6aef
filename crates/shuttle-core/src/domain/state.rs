//! State - 1 回のアップロード呼び出しの状態
//!
//! # 状態遷移
//! - Idle → Resolving → Uploading ⇄ Parsing → Reporting → Done
//! - Uploading → Done（アノテーションが無い場合）
//! - Resolving / Uploading / Parsing の失敗 → Resolving（全体やり直し）または Failed
//! - Reporting の失敗は Failed にならず Done に遷移する

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Resolving,
    Uploading,
    Parsing,
    Reporting,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        match (self, next) {
            // 空の instruction は何もせずに完了
            (Idle, Resolving) | (Idle, Done) => true,
            // 最初の試行の前にキャンセル、または作業ディレクトリ未設定
            (Idle, Failed) => true,
            (Resolving, Uploading) | (Resolving, Failed) | (Resolving, Resolving) => true,
            (Uploading, Parsing) | (Uploading, Uploading) => true,
            (Parsing, Uploading) => true,
            (Uploading | Parsing, Resolving) | (Uploading | Parsing, Failed) => true,
            (Uploading | Parsing, Reporting) | (Uploading | Parsing, Done) => true,
            (Reporting, Done) => true,
            _ => false,
        }
    }
}

/// Tracks the current state of one pipeline invocation and its history.
///
/// Shared by reference between the retry loop and the attempt it runs, so the
/// state lives behind a mutex. The lock is never held across an await.
#[derive(Debug)]
pub struct StateTracker {
    inner: Mutex<Vec<PipelineState>>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(vec![PipelineState::Idle]),
        }
    }

    pub fn current(&self) -> PipelineState {
        let history = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        history.last().copied().unwrap_or(PipelineState::Idle)
    }

    pub fn history(&self) -> Vec<PipelineState> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Moves to `next`. Illegal transitions are ignored and reported as `false`.
    pub fn advance(&self, next: PipelineState) -> bool {
        let mut history = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let current = history.last().copied().unwrap_or(PipelineState::Idle);
        if current == next {
            return true;
        }
        if !current.can_transition_to(next) {
            tracing::warn!(from = ?current, to = ?next, "ignoring illegal pipeline transition");
            return false;
        }
        tracing::debug!(from = ?current, to = ?next, "pipeline transition");
        history.push(next);
        true
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

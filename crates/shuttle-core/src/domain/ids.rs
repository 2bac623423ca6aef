//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID + ジェネリック実装
//! アップロードの試行（attempt）とストリームのセッションは ULID で識別します。
//! Phantom type パターンにより、`SessionId` と `AttemptId` は同じ実装を
//! 共有しつつ、型としては混同できません。
//!
//! `TaskIdentification` だけは呼び出し側から渡される不透明なトークンで、
//! このクレートは中身を解釈しません（すべての送信メッセージにそのまま添付する）。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"session-", "attempt-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// ```ignore
/// let session: SessionId = Id::from(Ulid::new());
/// let attempt: AttemptId = Id::from(Ulid::new());
/// // session と attempt は異なる型なので、混同できない
/// ```
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }

    /// Milliseconds since the Unix epoch encoded in the ULID.
    pub fn timestamp_ms(&self) -> u64 {
        self.ulid.timestamp_ms()
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Upload session のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Session {}

impl IdMarker for Session {
    fn prefix() -> &'static str {
        "session-"
    }
}

/// Attempt のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attempt {}

impl IdMarker for Attempt {
    fn prefix() -> &'static str {
        "attempt-"
    }
}

pub type SessionId = Id<Session>;
pub type AttemptId = Id<Attempt>;

/// Correlation token of the task that produced the artifacts.
///
/// Forwarded verbatim on every outbound message. The secret never shows up in
/// `Debug` output so it cannot leak through logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskIdentification {
    pub task_id: String,
    #[serde(default)]
    pub secret: String,
}

impl TaskIdentification {
    pub fn new(task_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for TaskIdentification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskIdentification")
            .field("task_id", &self.task_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for TaskIdentification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_marker_prefix() {
        let session: SessionId = Id::from(Ulid::new());
        let attempt: AttemptId = Id::from(Ulid::new());

        assert!(session.to_string().starts_with("session-"));
        assert!(attempt.to_string().starts_with("attempt-"));
    }

    #[test]
    fn ids_roundtrip_through_json() {
        let session: SessionId = Id::from(Ulid::new());
        let s = serde_json::to_string(&session).unwrap();
        let back: SessionId = serde_json::from_str(&s).unwrap();
        assert_eq!(session, back);
    }

    #[test]
    fn task_identification_debug_hides_secret() {
        let id = TaskIdentification::new("42", "hunter2");
        let rendered = format!("{id:?}");
        assert!(rendered.contains("42"));
        assert!(!rendered.contains("hunter2"));
        assert_eq!(id.to_string(), "task-42");
    }
}

//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use crate::domain::ids::{AttemptId, SessionId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator はアップロードのセッション ID と試行 ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（並行する複数の呼び出しから使える）
pub trait IdGenerator: Send + Sync {
    fn generate_session_id(&self) -> SessionId;

    fn generate_attempt_id(&self) -> AttemptId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// テスト時に FixedClock を使えば timestamp 部分が決定的になります。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_session_id(&self) -> SessionId {
        SessionId::from(self.next_ulid())
    }

    fn generate_attempt_id(&self) -> AttemptId {
        AttemptId::from(self.next_ulid())
    }
}

//! ProgressSink の実装
//!
//! - **BufferProgress**: メモリに溜める（テスト・CLI のサマリー用）
//! - **TracingProgress**: tracing に流す

use std::sync::{Arc, Mutex, PoisonError};

use crate::ports::ProgressSink;

/// Collects every fragment in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferProgress {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl BufferProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl ProgressSink for BufferProgress {
    fn write(&self, fragment: &[u8]) {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.extend_from_slice(fragment);
    }
}

/// Forwards fragments to `tracing` at info level, one event per fragment.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn write(&self, fragment: &[u8]) {
        let text = String::from_utf8_lossy(fragment);
        let text = text.trim();
        if !text.is_empty() {
            tracing::info!(target: "shuttle::progress", "{text}");
        }
    }
}

//! ProgressSink port - オペレーター向けの進捗テキスト
//!
//! 追記専用。制御判断には一切使わない。

/// Append-only sink for human-readable progress fragments (UTF-8 bytes).
pub trait ProgressSink: Send + Sync {
    fn write(&self, fragment: &[u8]);

    fn write_str(&self, fragment: &str) {
        self.write(fragment.as_bytes());
    }
}

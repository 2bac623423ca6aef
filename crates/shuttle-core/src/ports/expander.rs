//! TextExpander port - glob パターン中のプレースホルダー展開

use std::collections::HashMap;

/// Expands placeholders (e.g. `$CIRRUS_WORKING_DIR`) in `text` using `env`.
pub trait TextExpander: Send + Sync {
    fn expand(&self, text: &str, env: &HashMap<String, String>) -> String;
}

//! EnvExpander - 環境変数によるプレースホルダー展開
//!
//! `$VAR`, `${VAR}`, `%VAR%` を展開します。未定義の変数は元の表記のまま残します。

use std::collections::HashMap;

use crate::ports::TextExpander;

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvExpander;

impl TextExpander for EnvExpander {
    fn expand(&self, text: &str, env: &HashMap<String, String>) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(pos) = rest.find(['$', '%']) {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            match expand_one(tail, env) {
                Some((value, consumed)) => {
                    out.push_str(&value);
                    rest = &tail[consumed..];
                }
                None => {
                    // 展開できない記号はそのまま 1 文字だけ進める
                    out.push_str(&tail[..1]);
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Tries to expand the placeholder at the start of `tail`. Returns the
/// replacement and how many bytes of `tail` it covers.
fn expand_one(tail: &str, env: &HashMap<String, String>) -> Option<(String, usize)> {
    let (name, consumed) = if let Some(braced) = tail.strip_prefix("${") {
        let end = braced.find('}')?;
        (&braced[..end], end + 3)
    } else if let Some(body) = tail.strip_prefix('$') {
        let len = body
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(body.len());
        (&body[..len], len + 1)
    } else {
        let body = tail.strip_prefix('%')?;
        let end = body.find('%')?;
        (&body[..end], end + 2)
    };

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    let value = env.get(name)?;
    Some((value.clone(), consumed))
}

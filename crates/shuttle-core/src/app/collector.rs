//! AnnotationCollector - format 別パーサーの呼び出しと正規化
//!
//! # 設計
//! - パーサーは format 名で引く（`ParserRegistry`）
//! - 未登録・空の format はエラーではなく「アノテーション無し」
//! - 正規化の失敗はソフトエラー（ログに出すだけで成功は覆さない）

use std::path::Path;

use crate::domain::{Annotation, ArtifactError};
use crate::impls::ParserRegistry;
use crate::ports::{AnnotationNormalizer, Normalized};

pub struct AnnotationCollector<'a> {
    registry: &'a ParserRegistry,
    normalizer: &'a dyn AnnotationNormalizer,
}

impl<'a> AnnotationCollector<'a> {
    pub fn new(registry: &'a ParserRegistry, normalizer: &'a dyn AnnotationNormalizer) -> Self {
        Self {
            registry,
            normalizer,
        }
    }

    /// Parses one uploaded file with the parser registered for `format`.
    pub async fn parse(&self, path: &Path, format: &str) -> Result<Vec<Annotation>, ArtifactError> {
        let Some(parser) = self.registry.get(format) else {
            tracing::debug!(format, path = %path.display(), "no parser registered for format");
            return Ok(Vec::new());
        };

        let annotations = parser
            .parse(path)
            .await
            .map_err(|source| ArtifactError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!(
            format,
            path = %path.display(),
            count = annotations.len(),
            "parsed annotations"
        );
        Ok(annotations)
    }

    /// Rewrites the aggregated list relative to `working_dir`.
    pub fn normalize(&self, working_dir: &Path, annotations: Vec<Annotation>) -> Normalized {
        if annotations.is_empty() {
            return Normalized::default();
        }
        let normalized = self.normalizer.normalize(working_dir, annotations);
        if normalized.has_rejections() {
            tracing::warn!(
                kept = normalized.annotations.len(),
                rejected = normalized.rejected.len(),
                "some annotations failed validation"
            );
        }
        normalized
    }
}

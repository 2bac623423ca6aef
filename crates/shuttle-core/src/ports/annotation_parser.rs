//! AnnotationParser port - フォーマット別パーサーと正規化
//!
//! パーサー本体（JUnit など）は外部の能力として扱い、
//! このクレートは format 文字列で引いて呼び出すだけです。

use std::path::Path;

use async_trait::async_trait;

use crate::domain::{Annotation, NormalizeError, ParseError};

/// Parses one artifact file of a specific format into annotations.
#[async_trait]
pub trait AnnotationParser: Send + Sync {
    async fn parse(&self, path: &Path) -> Result<Vec<Annotation>, ParseError>;
}

/// Result of normalization: the annotations that survived plus the reasons
/// the others were discarded. Rejections are a soft error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub annotations: Vec<Annotation>,
    pub rejected: Vec<NormalizeError>,
}

impl Normalized {
    pub fn has_rejections(&self) -> bool {
        !self.rejected.is_empty()
    }
}

/// Rewrites annotation paths relative to the working directory and validates
/// them.
pub trait AnnotationNormalizer: Send + Sync {
    fn normalize(&self, working_dir: &Path, annotations: Vec<Annotation>) -> Normalized;
}

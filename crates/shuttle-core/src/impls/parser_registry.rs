//! ParserRegistry - format 名からパーサーを引くレジストリ
//!
//! # 設計
//! - 初期化時に登録（mutable）
//! - 実行時は参照のみ（immutable）。ロック不要
//! - 未登録・空の format は「パース不要」として扱う

use std::collections::HashMap;
use std::sync::Arc;

use crate::ports::AnnotationParser;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("parser for format '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("parser format must not be empty")]
    EmptyFormat,
}

#[derive(Default, Clone)]
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn AnnotationParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        format: impl Into<String>,
        parser: Arc<dyn AnnotationParser>,
    ) -> Result<(), RegistryError> {
        let format = format.into();
        if format.is_empty() {
            return Err(RegistryError::EmptyFormat);
        }
        if self.parsers.contains_key(&format) {
            return Err(RegistryError::AlreadyRegistered(format));
        }
        self.parsers.insert(format, parser);
        Ok(())
    }

    pub fn get(&self, format: &str) -> Option<Arc<dyn AnnotationParser>> {
        self.parsers.get(format).cloned()
    }

    pub fn contains(&self, format: &str) -> bool {
        self.parsers.contains_key(format)
    }

    pub fn registered_formats(&self) -> Vec<String> {
        let mut formats: Vec<String> = self.parsers.keys().cloned().collect();
        formats.sort();
        formats
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Annotation, ParseError};
    use async_trait::async_trait;
    use std::path::Path;

    struct NoopParser;

    #[async_trait]
    impl AnnotationParser for NoopParser {
        async fn parse(&self, _path: &Path) -> Result<Vec<Annotation>, ParseError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn register_and_get() {
        let mut registry = ParserRegistry::new();
        registry.register("junit", Arc::new(NoopParser)).unwrap();

        assert!(registry.get("junit").is_some());
        assert!(registry.get("golangci").is_none());
        assert!(registry.contains("junit"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn double_registration_is_rejected() {
        let mut registry = ParserRegistry::new();
        registry.register("junit", Arc::new(NoopParser)).unwrap();
        let result = registry.register("junit", Arc::new(NoopParser));
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(f)) if f == "junit"));
    }

    #[test]
    fn empty_format_is_rejected() {
        let mut registry = ParserRegistry::new();
        assert!(matches!(
            registry.register("", Arc::new(NoopParser)),
            Err(RegistryError::EmptyFormat)
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn registered_formats_are_sorted() {
        let mut registry = ParserRegistry::new();
        registry.register("junit", Arc::new(NoopParser)).unwrap();
        registry.register("golangci", Arc::new(NoopParser)).unwrap();
        assert_eq!(registry.registered_formats(), vec!["golangci", "junit"]);
    }
}

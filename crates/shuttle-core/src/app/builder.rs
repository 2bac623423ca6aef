//! PipelineBuilder - ArtifactPipeline の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use std::sync::Arc;

use crate::app::pipeline::ArtifactPipeline;
use crate::config::{ConfigError, PipelineConfig};
use crate::domain::TaskIdentification;
use crate::impls::{EnvExpander, ParserRegistry, RegistryError, TracingProgress, WorkingDirNormalizer};
use crate::ports::{
    AnnotationNormalizer, AnnotationParser, AnnotationReporter, ArtifactStore, Clock, IdGenerator,
    ProgressSink, SystemClock, TextExpander, UlidGenerator,
};

/// PipelineBuilder は ArtifactPipeline を構築
///
/// # 使用例
/// ```ignore
/// let pipeline = PipelineBuilder::new(task_identification)
///     .artifact_store(store)
///     .annotation_reporter(reporter)
///     .register_parser("junit", Arc::new(JUnitParser))?
///     .expect_formats(&["junit"])
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - リモート側（store / reporter）は必須。未設定なら BuildError
/// - expect_formats() で期待される format を登録
/// - build() 時に「期待集合 ⊆ 登録済み集合」をチェック
/// - 設定値も build() 時に検証
pub struct PipelineBuilder {
    task_identification: TaskIdentification,
    store: Option<Arc<dyn ArtifactStore>>,
    reporter: Option<Arc<dyn AnnotationReporter>>,
    progress: Arc<dyn ProgressSink>,
    expander: Arc<dyn TextExpander>,
    normalizer: Arc<dyn AnnotationNormalizer>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    parsers: ParserRegistry,
    expected_formats: Option<Vec<String>>,
    config: PipelineConfig,
}

/// BuildError はパイプライン構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("artifact store is not configured")]
    MissingArtifactStore,

    #[error("annotation reporter is not configured")]
    MissingAnnotationReporter,

    #[error("Missing annotation formats: {0:?}. These formats were expected but not registered.")]
    MissingFormats(Vec<String>),

    #[error("invalid pipeline config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl PipelineBuilder {
    /// 新しい PipelineBuilder を作成
    pub fn new(task_identification: TaskIdentification) -> Self {
        Self {
            task_identification,
            store: None,
            reporter: None,
            progress: Arc::new(TracingProgress),
            expander: Arc::new(EnvExpander),
            normalizer: Arc::new(WorkingDirNormalizer),
            clock: Arc::new(SystemClock),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
            parsers: ParserRegistry::new(),
            expected_formats: None,
            config: PipelineConfig::default(),
        }
    }

    pub fn artifact_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn annotation_reporter(mut self, reporter: Arc<dyn AnnotationReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn expander(mut self, expander: Arc<dyn TextExpander>) -> Self {
        self.expander = expander;
        self
    }

    pub fn normalizer(mut self, normalizer: Arc<dyn AnnotationNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// パーサーを登録
    ///
    /// # Example
    /// ```ignore
    /// builder.register_parser("junit", Arc::new(JUnitParser))?;
    /// ```
    pub fn register_parser(
        mut self,
        format: impl Into<String>,
        parser: Arc<dyn AnnotationParser>,
    ) -> Result<Self, RegistryError> {
        self.parsers.register(format, parser)?;
        Ok(self)
    }

    /// 組み立て済みのレジストリで置き換える
    pub fn parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = parsers;
        self
    }

    /// 期待される format のリストを設定
    pub fn expect_formats(mut self, formats: &[&str]) -> Self {
        self.expected_formats = Some(formats.iter().map(|f| f.to_string()).collect());
        self
    }

    /// PipelineBuilder を構築して ArtifactPipeline を生成
    ///
    /// # 検証
    /// - store / reporter が設定されているか
    /// - expect_formats() で設定された format が全て登録されているか
    /// - PipelineConfig::validate()
    pub fn build(self) -> Result<ArtifactPipeline, BuildError> {
        let store = self.store.ok_or(BuildError::MissingArtifactStore)?;
        let reporter = self.reporter.ok_or(BuildError::MissingAnnotationReporter)?;

        if let Some(expected_formats) = &self.expected_formats {
            let missing_formats: Vec<String> = expected_formats
                .iter()
                .filter(|format| !self.parsers.contains(format))
                .cloned()
                .collect();
            if !missing_formats.is_empty() {
                return Err(BuildError::MissingFormats(missing_formats));
            }
        }

        self.config.validate()?;
        tracing::debug!(
            task = %self.task_identification,
            formats = ?self.parsers.registered_formats(),
            chunk_size = self.config.chunk_size,
            "artifact pipeline built"
        );

        Ok(ArtifactPipeline {
            store,
            reporter,
            progress: self.progress,
            expander: self.expander,
            normalizer: self.normalizer,
            parsers: self.parsers,
            clock: self.clock,
            ids: self.ids,
            config: self.config,
            task_identification: self.task_identification,
        })
    }
}

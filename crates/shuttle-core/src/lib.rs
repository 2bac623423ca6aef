//! shuttle-core
//!
//! Artifact collection and upload for a CI task runner.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（instruction, annotation, wire entries, errors, state, outcome）
//! - **ports**: 抽象化レイヤー（ArtifactStore, AnnotationReporter, ProgressSink, TextExpander, AnnotationParser, など）
//! - **app**: アプリケーションロジック（builder, pipeline, resolver, uploader, collector, retry）
//! - **impls**: 実装（InMemoryArtifactStore, EnvExpander, WorkingDirNormalizer など）
//! - **config**: PipelineConfig

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{ArtifactPipeline, BuildError, PipelineBuilder, RetryPolicy};
pub use config::{ConfigError, PipelineConfig};
pub use domain::{
    Annotation, ArtifactError, ArtifactsInstruction, Outcome, OutcomeKind, TaskIdentification,
};
pub use tokio_util::sync::CancellationToken;

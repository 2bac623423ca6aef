//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **EnvExpander**: `$VAR` / `${VAR}` / `%VAR%` の展開
//! - **WorkingDirNormalizer**: アノテーションのパスを作業ディレクトリ相対に揃える
//! - **ParserRegistry**: format 名 → AnnotationParser
//! - **BufferProgress / TracingProgress**: 進捗シンク
//! - **InMemoryArtifactStore / InMemoryAnnotationReporter**: 開発用・テスト用のリモート
//!
//! # 本番用実装
//! gRPC などのリモート実装は別クレートに配置する想定です。

pub mod expander;
pub mod inmem_store;
pub mod normalizer;
pub mod parser_registry;
pub mod progress;

// 主要な型を再エクスポート
pub use self::expander::EnvExpander;
pub use self::inmem_store::{
    FaultPlan, InMemoryAnnotationReporter, InMemoryArtifactStore, RecordedStream,
};
pub use self::normalizer::WorkingDirNormalizer;
pub use self::parser_registry::{ParserRegistry, RegistryError};
pub use self::progress::{BufferProgress, TracingProgress};

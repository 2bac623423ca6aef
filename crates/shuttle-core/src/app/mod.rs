//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **PipelineBuilder**: パイプラインの構築とワイヤリング
//! - **ArtifactPipeline**: `upload_artifacts`（2 段のリトライ付き）
//! - **PathResolver**: glob の展開と作業ディレクトリ内チェック
//! - **ChunkedUploader**: 1 ストリームへのチャンク送信
//! - **AnnotationCollector**: format 別パーサーの呼び出しと正規化
//! - **RetryCoordinator**: 上限付きリトライとキャンセル

pub mod builder;
pub mod collector;
pub mod pipeline;
pub mod resolver;
pub mod retry;
pub mod uploader;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, PipelineBuilder};
pub use self::collector::AnnotationCollector;
pub use self::pipeline::ArtifactPipeline;
pub use self::resolver::PathResolver;
pub use self::retry::{Retried, RetryCoordinator, RetryPolicy};
pub use self::uploader::{ChunkedUploader, UploadReport, UploadSession};

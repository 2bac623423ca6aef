//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部の協力者（artifact ストレージ、報告 RPC、進捗ログ、
//! プレースホルダー展開、フォーマット別パーサー）へのインターフェースで、
//! 実装の詳細を隠蔽します。

pub mod annotation_parser;
pub mod artifact_store;
pub mod clock;
pub mod expander;
pub mod id_generator;
pub mod progress;
pub mod reporter;

pub use self::annotation_parser::{AnnotationNormalizer, AnnotationParser, Normalized};
pub use self::artifact_store::{ArtifactStore, UploadStream};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::expander::TextExpander;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::progress::ProgressSink;
pub use self::reporter::AnnotationReporter;

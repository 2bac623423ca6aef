//! ArtifactStore port - リモートの artifact ストレージへのアップロードストリーム
//!
//! 1 回のアップロード試行につき 1 本のストリームを開き、
//! 全パターン・全ファイルをそのストリームに流してから閉じます。

use async_trait::async_trait;

use crate::domain::{ArtifactEntry, TransportError, UploadAck};

/// ArtifactStore は新しいアップロードストリームを開く
///
/// # 設計原則
/// - ストリームは呼び出し（試行）ごとに独立。リトライ間で共有しない
/// - 並行する呼び出しはそれぞれ別のストリームを持つ
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn open_stream(&self) -> Result<Box<dyn UploadStream>, TransportError>;
}

/// One open client-streaming upload.
///
/// Entries must be sent in order; `close_and_recv` ends the stream and waits
/// for the remote acknowledgement. A stream is closed at most once.
#[async_trait]
pub trait UploadStream: Send {
    async fn send(&mut self, entry: ArtifactEntry) -> Result<(), TransportError>;

    async fn close_and_recv(self: Box<Self>) -> Result<UploadAck, TransportError>;
}

//! ChunkedUploader - 1 回の試行で 1 本のストリームにすべてを流す
//!
//! # フロー
//! 1. ストリームを開く（試行ごとに新しい UploadSession）
//! 2. パターンごとにバッチヘッダーを送る
//! 3. ファイルごとにチャンクを送り、必要ならアノテーションを取り出す
//! 4. 成否に関わらずストリームを 1 度だけ閉じて ack を受け取る
//!
//! # 学習ポイント
//! - バッファはセッションにつき 1 つだけ確保して使い回す（メモリ上限 = 1 チャンク）
//! - ブロックする操作はすべてキャンセルと select する
//! - close の失敗はログに出すだけで、試行の結果は上書きしない

use std::future::Future;
use std::path::Path;

use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::app::collector::AnnotationCollector;
use crate::app::resolver::relative_artifact_path;
use crate::config::PipelineConfig;
use crate::domain::{
    Annotation, ArtifactChunk, ArtifactEntry, ArtifactError, ArtifactsUpload, PipelineState,
    ProcessedPath, SessionId, StateTracker, UploadAck,
};
use crate::ports::{ArtifactStore, ProgressSink, UploadStream};

/// What one successful attempt sent.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReport {
    pub session_id: SessionId,
    /// Working-dir-relative paths, in upload order.
    pub uploaded_files: Vec<String>,
    pub annotations: Vec<Annotation>,
    pub chunks_sent: u64,
    pub bytes_sent: u64,
}

/// State owned by exactly one attempt: the open stream, the reusable read
/// buffer and the byte counters.
pub struct UploadSession {
    id: SessionId,
    stream: Box<dyn UploadStream>,
    buffer: Vec<u8>,
    file_bytes: u64,
    chunks_sent: u64,
    bytes_sent: u64,
}

impl UploadSession {
    pub fn new(id: SessionId, stream: Box<dyn UploadStream>, chunk_size: usize) -> Self {
        Self {
            id,
            stream,
            buffer: vec![0; chunk_size],
            file_bytes: 0,
            chunks_sent: 0,
            bytes_sent: 0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Bytes sent for the file currently being uploaded.
    pub fn file_bytes(&self) -> u64 {
        self.file_bytes
    }

    async fn send(
        &mut self,
        entry: ArtifactEntry,
        context: impl FnOnce() -> String,
        cancel: &CancellationToken,
    ) -> Result<(), ArtifactError> {
        cancellable(cancel, self.stream.send(entry))
            .await?
            .map_err(|source| ArtifactError::transport(context(), source))
    }

    /// Reads the next chunk of `reader` into the session buffer and sends it.
    /// Returns `false` once the file is exhausted.
    async fn send_next_chunk<R>(
        &mut self,
        reader: &mut R,
        path: &Path,
        artifact_path: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, ArtifactError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let n = cancellable(cancel, fill_buffer(reader, &mut self.buffer))
            .await?
            .map_err(|source| ArtifactError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        if n == 0 {
            return Ok(false);
        }

        let chunk = ArtifactChunk {
            artifact_path: artifact_path.to_string(),
            data: self.buffer[..n].to_vec(),
        };
        self.send(
            ArtifactEntry::Chunk(chunk),
            || format!("failed to upload artifact file {}", path.display()),
            cancel,
        )
        .await?;

        self.file_bytes += n as u64;
        self.bytes_sent += n as u64;
        self.chunks_sent += 1;
        Ok(true)
    }

    /// Closes the stream and drains the acknowledgement. Consumes the session
    /// so it cannot be closed twice.
    async fn close(self, cancel: &CancellationToken) -> Result<UploadAck, ArtifactError> {
        let close = self.stream.close_and_recv();
        tokio::select! {
            biased;
            ack = close => ack.map_err(|source| {
                ArtifactError::transport("failed to close artifacts upload stream", source)
            }),
            _ = cancel.cancelled() => Err(ArtifactError::Cancelled),
        }
    }
}

/// Streams the resolved files of one instruction and collects annotations
/// from them.
pub struct ChunkedUploader<'a> {
    store: &'a dyn ArtifactStore,
    collector: &'a AnnotationCollector<'a>,
    progress: &'a dyn ProgressSink,
    config: &'a PipelineConfig,
}

impl<'a> ChunkedUploader<'a> {
    pub fn new(
        store: &'a dyn ArtifactStore,
        collector: &'a AnnotationCollector<'a>,
        progress: &'a dyn ProgressSink,
        config: &'a PipelineConfig,
    ) -> Self {
        Self {
            store,
            collector,
            progress,
            config,
        }
    }

    /// Uploads every file of every pattern over one freshly opened stream.
    ///
    /// `header` is sent once per pattern; its `format` selects the parser.
    /// The first failure aborts the attempt. The stream is closed either way.
    pub async fn upload(
        &self,
        session_id: SessionId,
        header: &ArtifactsUpload,
        processed: &[ProcessedPath],
        working_dir: &Path,
        states: &StateTracker,
        cancel: &CancellationToken,
    ) -> Result<UploadReport, ArtifactError> {
        let stream = cancellable(cancel, self.store.open_stream())
            .await?
            .map_err(|source| {
                ArtifactError::transport("failed to initialize artifacts upload client", source)
            })?;
        tracing::debug!(%session_id, "opened upload stream");
        states.advance(PipelineState::Uploading);

        let mut session = UploadSession::new(session_id, stream, self.config.chunk_size);
        let mut report = UploadReport {
            session_id,
            uploaded_files: Vec::new(),
            annotations: Vec::new(),
            chunks_sent: 0,
            bytes_sent: 0,
        };

        let result = self
            .upload_patterns(&mut session, header, processed, working_dir, states, &mut report, cancel)
            .await;
        report.chunks_sent = session.chunks_sent;
        report.bytes_sent = session.bytes_sent;

        match session.close(cancel).await {
            Ok(ack) => {
                tracing::debug!(%session_id, entries = ack.entries_received, "upload stream closed");
            }
            Err(err) => {
                tracing::warn!(%session_id, error = %err, "upload stream did not close cleanly");
                self.progress
                    .write_str(&format!("\nError from upload stream: {err}"));
            }
        }

        result.map(|()| report)
    }

    #[allow(clippy::too_many_arguments)]
    async fn upload_patterns(
        &self,
        session: &mut UploadSession,
        header: &ArtifactsUpload,
        processed: &[ProcessedPath],
        working_dir: &Path,
        states: &StateTracker,
        report: &mut UploadReport,
        cancel: &CancellationToken,
    ) -> Result<(), ArtifactError> {
        for (index, processed_path) in processed.iter().enumerate() {
            if index > 0 {
                self.progress.write_str("\n");
            }
            self.progress.write_str(&format!(
                "Uploading {} artifacts for {}",
                processed_path.paths.len(),
                processed_path.pattern
            ));

            session
                .send(
                    ArtifactEntry::ArtifactsUpload(header.clone()),
                    || "failed to initialize artifacts upload".to_string(),
                    cancel,
                )
                .await?;
            tracing::debug!(
                session_id = %session.id(),
                pattern = %processed_path.pattern,
                files = processed_path.paths.len(),
                "sent batch header"
            );

            for path in &processed_path.paths {
                let metadata = tokio::fs::metadata(path).await.ok();
                if metadata.as_ref().is_some_and(|m| m.is_dir()) {
                    self.progress.write_str(&format!(
                        "\nSkipping uploading of '{}' because it's a folder",
                        path.display()
                    ));
                    continue;
                }
                let hefty = metadata
                    .map(|m| m.len())
                    .filter(|&size| size > self.config.hefty_artifact_threshold);
                if let Some(size) = hefty {
                    tracing::info!(path = %path.display(), size, "uploading a large artifact");
                    self.progress.write_str(&format!(
                        "\nUploading a quite hefty artifact '{}' of size {}",
                        path.display(),
                        human_bytes(size)
                    ));
                }

                let artifact_path = self.upload_file(session, path, working_dir, cancel).await?;
                report.uploaded_files.push(artifact_path);

                if !header.format.is_empty() {
                    states.advance(PipelineState::Parsing);
                    self.progress.write_str(&format!(
                        "\nTrying to parse annotations for {} format",
                        header.format
                    ));
                    let annotations = self.collector.parse(path, &header.format).await?;
                    report.annotations.extend(annotations);
                    states.advance(PipelineState::Uploading);
                }
            }
        }
        Ok(())
    }

    /// Sends one file as a sequence of chunks. Returns its artifact path.
    async fn upload_file(
        &self,
        session: &mut UploadSession,
        path: &Path,
        working_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<String, ArtifactError> {
        // Containment was checked during resolution.
        let artifact_path = relative_artifact_path(working_dir, path).ok_or_else(|| {
            ArtifactError::ArtifactPath {
                path: path.to_path_buf(),
                working_dir: working_dir.to_path_buf(),
            }
        })?;

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| ArtifactError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let mut reader = BufReader::with_capacity(self.config.chunk_size, file);

        session.file_bytes = 0;
        while session
            .send_next_chunk(&mut reader, path, &artifact_path, cancel)
            .await?
        {}

        tracing::info!(
            session_id = %session.id(),
            artifact = %artifact_path,
            bytes = session.file_bytes(),
            "uploaded artifact"
        );
        self.progress
            .write_str(&format!("\nUploaded {}", path.display()));
        Ok(artifact_path)
    }
}

/// Awaits `fut` unless the token is (or becomes) cancelled first.
async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, ArtifactError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ArtifactError::Cancelled),
        output = fut => Ok(output),
    }
}

/// Reads until `buffer` is full or the reader is exhausted.
async fn fill_buffer<R>(reader: &mut R, buffer: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

/// SI size, e.g. `105 MB` or `1.5 GB`.
fn human_bytes(size: u64) -> String {
    const UNITS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];
    if size < 10 {
        return format!("{size} B");
    }

    let mut exponent = 0;
    let mut scaled = size;
    while scaled >= 1000 && exponent < UNITS.len() - 1 {
        scaled /= 1000;
        exponent += 1;
    }
    let value = size as f64 / 1000f64.powi(exponent as i32);
    let value = (value * 10.0 + 0.5).floor() / 10.0;
    if value < 10.0 {
        format!("{value:.1} {}", UNITS[exponent])
    } else {
        format!("{value:.0} {}", UNITS[exponent])
    }
}

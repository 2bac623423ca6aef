//! InMemoryArtifactStore / InMemoryAnnotationReporter - 開発用・テスト用の実装
//!
//! # 学習ポイント
//! - Mutex による排他制御（ロックを跨いで await しない）
//! - ストリームごとに受信したエントリを記録
//! - FaultPlan による障害注入（open / send / close / report）

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::{
    ArtifactChunk, ArtifactEntry, ArtifactsUpload, ReportAnnotationsRequest, TransportError,
    UploadAck,
};
use crate::ports::{AnnotationReporter, ArtifactStore, UploadStream};

/// How many upcoming operations should fail. Each failure consumes one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultPlan {
    pub failing_opens: u32,
    pub failing_sends: u32,
    pub failing_closes: u32,
}

/// Everything one upload stream received, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedStream {
    pub entries: Vec<ArtifactEntry>,
    pub closed: bool,
}

impl RecordedStream {
    pub fn headers(&self) -> Vec<&ArtifactsUpload> {
        self.entries.iter().filter_map(ArtifactEntry::as_upload).collect()
    }

    pub fn chunks(&self) -> Vec<&ArtifactChunk> {
        self.entries.iter().filter_map(ArtifactEntry::as_chunk).collect()
    }

    pub fn chunks_for(&self, artifact_path: &str) -> Vec<&ArtifactChunk> {
        self.chunks()
            .into_iter()
            .filter(|c| c.artifact_path == artifact_path)
            .collect()
    }

    /// Distinct artifact paths in the order they first appeared.
    pub fn files(&self) -> Vec<String> {
        let mut files: Vec<String> = Vec::new();
        for chunk in self.chunks() {
            if !files.contains(&chunk.artifact_path) {
                files.push(chunk.artifact_path.clone());
            }
        }
        files
    }

    /// Concatenated payload of every chunk sent for `artifact_path`.
    pub fn file_bytes(&self, artifact_path: &str) -> Vec<u8> {
        self.chunks_for(artifact_path)
            .into_iter()
            .flat_map(|c| c.data.iter().copied())
            .collect()
    }
}

#[derive(Debug, Default)]
struct StoreState {
    streams: Vec<RecordedStream>,
    faults: FaultPlan,
}

fn lock(state: &Mutex<StoreState>) -> MutexGuard<'_, StoreState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Artifact store that keeps every stream in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryArtifactStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: FaultPlan) -> Self {
        let store = Self::new();
        store.set_faults(faults);
        store
    }

    pub fn set_faults(&self, faults: FaultPlan) {
        lock(&self.state).faults = faults;
    }

    pub fn streams(&self) -> Vec<RecordedStream> {
        lock(&self.state).streams.clone()
    }

    pub fn stream_count(&self) -> usize {
        lock(&self.state).streams.len()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn open_stream(&self) -> Result<Box<dyn UploadStream>, TransportError> {
        let mut state = lock(&self.state);
        if state.faults.failing_opens > 0 {
            state.faults.failing_opens -= 1;
            return Err(TransportError::Unavailable("injected open failure".to_string()));
        }
        state.streams.push(RecordedStream::default());
        let index = state.streams.len() - 1;
        Ok(Box::new(InMemoryStream {
            index,
            state: Arc::clone(&self.state),
        }))
    }
}

struct InMemoryStream {
    index: usize,
    state: Arc<Mutex<StoreState>>,
}

#[async_trait]
impl UploadStream for InMemoryStream {
    async fn send(&mut self, entry: ArtifactEntry) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        if state.faults.failing_sends > 0 {
            state.faults.failing_sends -= 1;
            return Err(TransportError::Unavailable("injected send failure".to_string()));
        }
        let stream = state
            .streams
            .get_mut(self.index)
            .ok_or(TransportError::StreamClosed)?;
        if stream.closed {
            return Err(TransportError::StreamClosed);
        }
        stream.entries.push(entry);
        Ok(())
    }

    async fn close_and_recv(self: Box<Self>) -> Result<UploadAck, TransportError> {
        let mut state = lock(&self.state);
        let inject = state.faults.failing_closes > 0;
        if inject {
            state.faults.failing_closes -= 1;
        }
        let stream = state
            .streams
            .get_mut(self.index)
            .ok_or(TransportError::StreamClosed)?;
        if stream.closed {
            return Err(TransportError::StreamClosed);
        }
        stream.closed = true;
        if inject {
            return Err(TransportError::Rejected("injected close failure".to_string()));
        }
        Ok(UploadAck {
            entries_received: stream.entries.len() as u64,
        })
    }
}

#[derive(Debug, Default)]
struct ReporterState {
    requests: Vec<ReportAnnotationsRequest>,
    calls: u32,
    failing_reports: u32,
}

/// Annotation reporter that records accepted requests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAnnotationReporter {
    state: Arc<Mutex<ReporterState>>,
}

impl InMemoryAnnotationReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` report calls fail.
    pub fn failing(n: u32) -> Self {
        let reporter = Self::new();
        reporter
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .failing_reports = n;
        reporter
    }

    pub fn requests(&self) -> Vec<ReportAnnotationsRequest> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .requests
            .clone()
    }

    /// Number of calls, successful or not.
    pub fn calls(&self) -> u32 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).calls
    }
}

#[async_trait]
impl AnnotationReporter for InMemoryAnnotationReporter {
    async fn report_annotations(
        &self,
        request: &ReportAnnotationsRequest,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.calls += 1;
        if state.failing_reports > 0 {
            state.failing_reports -= 1;
            return Err(TransportError::Unavailable("injected report failure".to_string()));
        }
        state.requests.push(request.clone());
        Ok(())
    }
}

//! ArtifactPipeline - `upload_artifacts` の本体
//!
//! # 2 段構成
//! 1. アップロード段: resolve → upload → parse を 1 単位としてリトライ
//!    （PathOutsideWorkingDir だけは即座に終了）
//! 2. 報告段: 正規化後のアノテーションが空でなければ報告 RPC をリトライ
//!    （使い切ってもアノテーションを捨てて成功を返す）
//!
//! 1 回の呼び出しが持つ可変状態（ストリーム、バッファ、StateTracker）は
//! 呼び出しごとに作られるので、同じ pipeline を並行に呼んでも共有されません。

use std::collections::HashMap;
use std::sync::Arc;

use tracing::Instrument;
use tokio_util::sync::CancellationToken;

use crate::app::collector::AnnotationCollector;
use crate::app::resolver::PathResolver;
use crate::app::retry::{Retried, RetryCoordinator};
use crate::app::uploader::{ChunkedUploader, UploadReport};
use crate::config::PipelineConfig;
use crate::domain::{
    Annotation, ArtifactError, ArtifactsInstruction, ArtifactsUpload, DecisionRecord, Outcome,
    PipelineState, ReportAnnotationsRequest, SessionId, StateTracker, TaskIdentification,
};
use crate::impls::ParserRegistry;
use crate::ports::{
    AnnotationNormalizer, AnnotationReporter, ArtifactStore, Clock, IdGenerator, ProgressSink,
    TextExpander,
};

/// Collects, uploads and reports the artifacts of one task.
///
/// Built with [`PipelineBuilder`](crate::app::PipelineBuilder).
pub struct ArtifactPipeline {
    pub(crate) store: Arc<dyn ArtifactStore>,
    pub(crate) reporter: Arc<dyn AnnotationReporter>,
    pub(crate) progress: Arc<dyn ProgressSink>,
    pub(crate) expander: Arc<dyn TextExpander>,
    pub(crate) normalizer: Arc<dyn AnnotationNormalizer>,
    pub(crate) parsers: ParserRegistry,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) ids: Arc<dyn IdGenerator>,
    pub(crate) config: PipelineConfig,
    pub(crate) task_identification: TaskIdentification,
}

impl ArtifactPipeline {
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn task_identification(&self) -> &TaskIdentification {
        &self.task_identification
    }

    pub fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    /// Uploads the artifacts named by `instruction` under the artifact `name`.
    ///
    /// `env` supplies the working directory and the values for placeholder
    /// expansion. The returned outcome is a failure only when the upload stage
    /// fails; annotation reporting is best effort.
    pub async fn upload_artifacts(
        &self,
        name: &str,
        instruction: &ArtifactsInstruction,
        env: &HashMap<String, String>,
        cancel: &CancellationToken,
    ) -> Outcome {
        let states = StateTracker::new();

        if instruction.is_empty() {
            self.progress
                .write_str("\nSkipping artifacts upload because there are no path specified...");
            states.advance(PipelineState::Done);
            return Outcome::success().with_states(states.history());
        }

        let working_dir = match env.get(&self.config.working_dir_env) {
            Some(dir) if !dir.is_empty() => dir,
            _ => {
                let err = ArtifactError::MissingWorkingDir {
                    key: self.config.working_dir_env.clone(),
                };
                states.advance(PipelineState::Failed);
                self.progress
                    .write_str(&format!("\nFailed to upload artifacts: {err}"));
                return Outcome::failure(err.to_string()).with_states(states.history());
            }
        };

        let resolver = PathResolver::new(working_dir, self.expander.as_ref());
        let collector = AnnotationCollector::new(&self.parsers, self.normalizer.as_ref());
        let uploader = ChunkedUploader::new(
            self.store.as_ref(),
            &collector,
            self.progress.as_ref(),
            &self.config,
        );
        let attempt = UploadAttempt {
            resolver: &resolver,
            uploader: &uploader,
            header: ArtifactsUpload {
                task_identification: self.task_identification.clone(),
                name: name.to_string(),
                kind: instruction.kind.clone(),
                format: instruction.format.clone(),
            },
            patterns: &instruction.paths,
            env,
            states: &states,
            cancel,
        };

        let Retried {
            result,
            mut attempts,
            mut decisions,
        } = self.run_upload_stage(name, &attempt, cancel).await;

        let report = match result {
            Ok(report) => report,
            Err(err) => {
                states.advance(PipelineState::Failed);
                self.write_upload_failure(&err);
                return Outcome::failure(err.to_string())
                    .with_attempts(attempts)
                    .with_decisions(decisions)
                    .with_states(states.history());
            }
        };
        tracing::info!(
            artifact = name,
            session_id = %report.session_id,
            files = report.uploaded_files.len(),
            chunks = report.chunks_sent,
            bytes = report.bytes_sent,
            "artifacts uploaded"
        );

        let UploadReport {
            uploaded_files,
            annotations,
            ..
        } = report;
        let annotations = self.normalize(&collector, resolver.working_dir(), annotations);

        let mut outcome = Outcome::success();
        outcome.uploaded_files = uploaded_files;

        if !annotations.is_empty() {
            states.advance(PipelineState::Reporting);
            let count = annotations.len();
            let reported = self.run_report_stage(annotations, cancel).await;
            attempts.extend(reported.attempts);
            decisions.extend(reported.decisions);

            match reported.result {
                Ok(()) => {
                    tracing::info!(artifact = name, count, "reported annotations");
                    self.progress
                        .write_str(&format!("\nReported {count} annotations!"));
                    outcome.annotations_reported = count;
                }
                Err(err) => {
                    tracing::warn!(artifact = name, count, error = %err, "dropping annotations");
                    self.progress.write_str(&format!(
                        "\nStill failed to report {count} annotations: {err}. Ignoring..."
                    ));
                    outcome.annotations_dropped = count;
                    decisions.push(DecisionRecord::new(
                        serde_json::json!({ "error": err.to_string(), "annotations": count }),
                        "report_retry",
                        "drop_annotations",
                        self.clock.now(),
                    ));
                }
            }
        }

        states.advance(PipelineState::Done);
        outcome
            .with_attempts(attempts)
            .with_decisions(decisions)
            .with_states(states.history())
    }

    async fn run_upload_stage(
        &self,
        name: &str,
        attempt: &UploadAttempt<'_>,
        cancel: &CancellationToken,
    ) -> Retried<UploadReport> {
        let coordinator = RetryCoordinator::new(
            "upload_retry",
            &self.config.upload_retry,
            self.clock.as_ref(),
            self.ids.as_ref(),
            cancel,
        );
        let ids = self.ids.as_ref();
        let progress = self.progress.as_ref();

        coordinator
            .run(
                move |attempt_id, number| {
                    let session_id = ids.generate_session_id();
                    let span = tracing::info_span!(
                        "upload_attempt",
                        artifact = name,
                        %session_id,
                        %attempt_id,
                        attempt = number
                    );
                    attempt.run(session_id).instrument(span)
                },
                move |_, err| {
                    progress.write_str(&format!("\nFailed to upload artifacts: {err}"));
                    progress.write_str("\nRe-trying to upload artifacts...");
                },
            )
            .await
    }

    async fn run_report_stage(
        &self,
        annotations: Vec<Annotation>,
        cancel: &CancellationToken,
    ) -> Retried<()> {
        let coordinator = RetryCoordinator::new(
            "report_retry",
            &self.config.report_retry,
            self.clock.as_ref(),
            self.ids.as_ref(),
            cancel,
        );
        let request = ReportAnnotationsRequest {
            task_identification: self.task_identification.clone(),
            annotations,
        };
        let count = request.annotations.len();
        let request = &request;
        let reporter = self.reporter.as_ref();
        let progress = self.progress.as_ref();

        coordinator
            .run(
                move |_, _| async move {
                    reporter
                        .report_annotations(request)
                        .await
                        .map_err(ArtifactError::Report)
                },
                move |_, err| {
                    progress.write_str(&format!("\nFailed to report {count} annotations: {err}"));
                    progress.write_str("\nRetrying...");
                },
            )
            .await
    }

    fn normalize(
        &self,
        collector: &AnnotationCollector<'_>,
        working_dir: &std::path::Path,
        annotations: Vec<Annotation>,
    ) -> Vec<Annotation> {
        let normalized = collector.normalize(working_dir, annotations);
        if normalized.has_rejections() {
            let reasons: Vec<String> = normalized.rejected.iter().map(ToString::to_string).collect();
            self.progress.write_str(&format!(
                "\nFailed to validate annotations: {}",
                reasons.join("; ")
            ));
        }
        normalized.annotations
    }

    fn write_upload_failure(&self, err: &ArtifactError) {
        if err.is_retryable() {
            tracing::error!(error = %err, "artifact upload failed after all attempts");
            self.progress.write_str(&format!(
                "\nFailed to upload artifacts after multiple tries: {err}"
            ));
        } else {
            tracing::error!(error = %err, "artifact upload failed");
            self.progress
                .write_str(&format!("\nFailed to upload artifacts: {err}"));
        }
    }
}

/// Everything one resolve → upload → parse attempt needs. Rebuilt state
/// (resolved paths, stream, buffer) lives only inside `run`.
struct UploadAttempt<'a> {
    resolver: &'a PathResolver<'a>,
    uploader: &'a ChunkedUploader<'a>,
    header: ArtifactsUpload,
    patterns: &'a [String],
    env: &'a HashMap<String, String>,
    states: &'a StateTracker,
    cancel: &'a CancellationToken,
}

impl UploadAttempt<'_> {
    async fn run(&self, session_id: SessionId) -> Result<UploadReport, ArtifactError> {
        self.states.advance(PipelineState::Resolving);
        let processed = self.resolver.resolve(self.patterns, self.env)?;
        self.uploader
            .upload(
                session_id,
                &self.header,
                &processed,
                self.resolver.working_dir(),
                self.states,
                self.cancel,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::retry::RetryPolicy;
    use crate::app::PipelineBuilder;
    use crate::domain::{OutcomeKind, TransportError};
    use crate::impls::{BufferProgress, FaultPlan, InMemoryAnnotationReporter, InMemoryArtifactStore};
    use std::fs;
    use tempfile::TempDir;

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            upload_retry: RetryPolicy::immediate(2),
            report_retry: RetryPolicy::immediate(2),
            ..PipelineConfig::default()
        }
    }

    fn env_for(dir: &TempDir) -> HashMap<String, String> {
        HashMap::from([(
            "CIRRUS_WORKING_DIR".to_string(),
            dir.path().to_string_lossy().into_owned(),
        )])
    }

    fn pipeline(
        store: &InMemoryArtifactStore,
        progress: &BufferProgress,
    ) -> ArtifactPipeline {
        PipelineBuilder::new(TaskIdentification::new("1", "secret"))
            .artifact_store(Arc::new(store.clone()))
            .annotation_reporter(Arc::new(InMemoryAnnotationReporter::new()))
            .progress(Arc::new(progress.clone()))
            .config(fast_config())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn empty_instruction_skips_without_opening_a_stream() {
        let store = InMemoryArtifactStore::new();
        let progress = BufferProgress::new();
        let outcome = pipeline(&store, &progress)
            .upload_artifacts(
                "logs",
                &ArtifactsInstruction::default(),
                &HashMap::new(),
                &CancellationToken::new(),
            )
            .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.states, vec![PipelineState::Idle, PipelineState::Done]);
        assert_eq!(store.stream_count(), 0);
        assert_eq!(
            progress.contents(),
            "\nSkipping artifacts upload because there are no path specified..."
        );
    }

    #[tokio::test]
    async fn missing_working_dir_fails_without_attempts() {
        let store = InMemoryArtifactStore::new();
        let progress = BufferProgress::new();
        let outcome = pipeline(&store, &progress)
            .upload_artifacts(
                "logs",
                &ArtifactsInstruction::new(["*.log"]),
                &HashMap::new(),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.kind, OutcomeKind::Failure);
        assert!(outcome.attempts.is_empty());
        assert_eq!(store.stream_count(), 0);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_with_a_fresh_stream() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.log"), b"hello").unwrap();
        let store = InMemoryArtifactStore::with_faults(FaultPlan {
            failing_sends: 1,
            ..FaultPlan::default()
        });
        let progress = BufferProgress::new();

        let outcome = pipeline(&store, &progress)
            .upload_artifacts(
                "logs",
                &ArtifactsInstruction::new(["*.log"]),
                &env_for(&dir),
                &CancellationToken::new(),
            )
            .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.uploaded_files, vec!["a.log"]);
        assert_eq!(outcome.attempts.len(), 2);
        assert_eq!(outcome.decisions[0].decision, "retry");
        assert_eq!(store.stream_count(), 2);
        assert!(store.streams().iter().all(|s| s.closed));

        let text = progress.contents();
        assert!(text.contains("\nFailed to upload artifacts: failed to initialize artifacts upload: "));
        assert!(text.contains("\nRe-trying to upload artifacts..."));
    }

    #[tokio::test]
    async fn exhausted_budget_reports_failure() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.log"), b"hello").unwrap();
        let store = InMemoryArtifactStore::with_faults(FaultPlan {
            failing_opens: 5,
            ..FaultPlan::default()
        });
        let progress = BufferProgress::new();

        let outcome = pipeline(&store, &progress)
            .upload_artifacts(
                "logs",
                &ArtifactsInstruction::new(["*.log"]),
                &env_for(&dir),
                &CancellationToken::new(),
            )
            .await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.attempts.len(), 2);
        assert_eq!(outcome.final_state(), Some(PipelineState::Failed));
        assert_eq!(
            outcome.decisions.last().map(|d| d.decision.as_str()),
            Some("give_up")
        );
        assert!(progress
            .contents()
            .contains("\nFailed to upload artifacts after multiple tries: failed to initialize artifacts upload client: "));
        assert_eq!(
            outcome.reason,
            Some(
                ArtifactError::transport(
                    "failed to initialize artifacts upload client",
                    TransportError::Unavailable("injected open failure".to_string())
                )
                .to_string()
            )
        );
    }
}

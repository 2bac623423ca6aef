use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use shuttle_core::impls::{InMemoryAnnotationReporter, InMemoryArtifactStore, RecordedStream};
use shuttle_core::{ArtifactsInstruction, Outcome, PipelineBuilder, PipelineConfig, TaskIdentification};

/// Collect artifacts matching glob patterns and stream them to an in-memory store.
#[derive(Debug, Parser)]
#[command(name = "shuttle", version)]
struct Cli {
    /// Sandbox root; every match must stay inside it.
    #[arg(long)]
    working_dir: PathBuf,

    /// Artifact name sent in every batch header.
    #[arg(long, default_value = "artifacts")]
    name: String,

    /// Opaque type tag forwarded verbatim.
    #[arg(long = "type", default_value = "")]
    kind: String,

    /// Annotation format (empty = no parsing).
    #[arg(long, default_value = "")]
    format: String,

    /// JSON file with pipeline settings.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "local")]
    task_id: String,

    /// Glob patterns, relative to the working directory unless absolute.
    patterns: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Manifest {
    outcome: Outcome,
    streams: Vec<StreamSummary>,
}

#[derive(Debug, Serialize)]
struct StreamSummary {
    closed: bool,
    batches: usize,
    files: Vec<FileSummary>,
}

#[derive(Debug, Serialize)]
struct FileSummary {
    path: String,
    bytes: usize,
    chunks: usize,
}

impl From<&RecordedStream> for StreamSummary {
    fn from(stream: &RecordedStream) -> Self {
        let files = stream
            .files()
            .into_iter()
            .map(|path| FileSummary {
                bytes: stream.file_bytes(&path).len(),
                chunks: stream.chunks_for(&path).len(),
                path,
            })
            .collect();
        Self {
            closed: stream.closed,
            batches: stream.headers().len(),
            files,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = load_config(cli.config.as_deref())?;

    // (A) リモート側は in-memory で代用
    let store = InMemoryArtifactStore::new();
    let reporter = InMemoryAnnotationReporter::new();

    let mut env: HashMap<String, String> = std::env::vars().collect();
    env.insert(
        config.working_dir_env.clone(),
        cli.working_dir.to_string_lossy().into_owned(),
    );

    let pipeline = PipelineBuilder::new(TaskIdentification::new(cli.task_id, ""))
        .artifact_store(Arc::new(store.clone()))
        .annotation_reporter(Arc::new(reporter))
        .config(config)
        .build()
        .context("failed to build artifact pipeline")?;

    // (B) Ctrl-C でキャンセル
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling upload");
            on_signal.cancel();
        }
    });

    // (C) アップロード
    let instruction = ArtifactsInstruction::new(cli.patterns)
        .with_kind(cli.kind)
        .with_format(cli.format);
    let outcome = pipeline
        .upload_artifacts(&cli.name, &instruction, &env, &cancel)
        .await;

    // (D) マニフェストを stdout に出す
    let success = outcome.is_success();
    let manifest = Manifest {
        outcome,
        streams: store.streams().iter().map(StreamSummary::from).collect(),
    };
    println!("{}", serde_json::to_string_pretty(&manifest)?);

    Ok(success)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse config {}", path.display()))
}

//! Wire messages of the artifact upload stream and the annotation report RPC.
//!
//! One stream carries, in order, a batch header per pattern followed by the
//! chunks of every file that pattern matched.

use serde::{Deserialize, Serialize};

use super::annotation::Annotation;
use super::ids::TaskIdentification;

/// Batch header: establishes the destination for the chunks that follow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactsUpload {
    pub task_identification: TaskIdentification,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub format: String,
}

/// A bounded slice of one file's bytes.
///
/// `artifact_path` is slash-separated and relative to the working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactChunk {
    pub artifact_path: String,
    pub data: Vec<u8>,
}

/// Union message sent over the upload stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ArtifactEntry {
    ArtifactsUpload(ArtifactsUpload),
    Chunk(ArtifactChunk),
}

impl ArtifactEntry {
    pub fn as_upload(&self) -> Option<&ArtifactsUpload> {
        match self {
            Self::ArtifactsUpload(upload) => Some(upload),
            Self::Chunk(_) => None,
        }
    }

    pub fn as_chunk(&self) -> Option<&ArtifactChunk> {
        match self {
            Self::Chunk(chunk) => Some(chunk),
            Self::ArtifactsUpload(_) => None,
        }
    }
}

/// Remote acknowledgement returned when the upload stream is closed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadAck {
    pub entries_received: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportAnnotationsRequest {
    pub task_identification: TaskIdentification,
    pub annotations: Vec<Annotation>,
}

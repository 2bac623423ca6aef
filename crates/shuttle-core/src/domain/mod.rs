//! Domain model (instruction, annotations, wire entries, errors, outcomes).

pub mod annotation;
pub mod attempt;
pub mod entry;
pub mod errors;
pub mod ids;
pub mod instruction;
pub mod outcome;
pub mod state;

pub use annotation::{Annotation, AnnotationKind, AnnotationLevel, FileLocation};
pub use attempt::{AttemptRecord, DecisionRecord};
pub use entry::{ArtifactChunk, ArtifactEntry, ArtifactsUpload, ReportAnnotationsRequest, UploadAck};
pub use errors::{ArtifactError, ErrorKind, NormalizeError, ParseError, TransportError};
pub use ids::{AttemptId, SessionId, TaskIdentification};
pub use instruction::{ArtifactsInstruction, ProcessedPath};
pub use outcome::{Outcome, OutcomeKind};
pub use state::{PipelineState, StateTracker};

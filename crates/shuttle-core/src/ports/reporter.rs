//! AnnotationReporter port - アノテーション報告 RPC

use async_trait::async_trait;

use crate::domain::{ReportAnnotationsRequest, TransportError};

/// Submits collected annotations for a task. The acknowledgement carries no
/// payload; only success or failure matters.
#[async_trait]
pub trait AnnotationReporter: Send + Sync {
    async fn report_annotations(
        &self,
        request: &ReportAnnotationsRequest,
    ) -> Result<(), TransportError>;
}

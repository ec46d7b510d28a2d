//! The error kinds §7 of the specification surfaces from the core.
//!
//! This enum lives in `pii_protocol` (not `pii_core`) because `pii_db` and
//! `pii_detect` need to report `MetadataExtraction`/`DataSampling`/
//! `PiiDetection` failures without depending on the orchestration crate.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ScanErrorKind {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("report not ready: {0}")]
    NotReady(String),

    #[error("metadata extraction failed: {0}")]
    MetadataExtraction(String),

    #[error("data sampling failed: {0}")]
    DataSampling(String),

    #[error("pii detection failed: {0}")]
    PiiDetection(String),

    #[error("report generation failed: {0}")]
    ReportGeneration(String),

    #[error("scan cancelled")]
    Cancelled,

    #[error("unsupported report format: {0}")]
    UnsupportedFormat(String),
}

impl ScanErrorKind {
    /// The string recorded on `Job.error_message` when this kind fails a job.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

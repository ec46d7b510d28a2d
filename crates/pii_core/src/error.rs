//! Top-level scan error, composing each lower crate's error vocabulary into
//! the one enum the orchestrator and its callers actually see.

use pii_protocol::ScanErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("{0}")]
    Kind(ScanErrorKind),

    #[error("database error: {0}")]
    Db(#[from] pii_db::DbError),

    #[error("detection error: {0}")]
    Detect(#[from] pii_detect::DetectError),

    #[error("quasi-identifier analysis error: {0}")]
    Qi(#[from] pii_qi::QiError),

    #[error("job {0} not found")]
    JobNotFound(String),

    #[error("job {0} is not yet ready (still in phase {1})")]
    JobNotReady(String, String),

    #[error("unsupported report format: {0}")]
    UnsupportedFormat(String),
}

impl ScanError {
    pub fn kind(&self) -> ScanErrorKind {
        match self {
            ScanError::Kind(k) => k.clone(),
            ScanError::Db(e) => ScanErrorKind::DataSampling(e.to_string()),
            ScanError::Detect(e) => ScanErrorKind::PiiDetection(e.to_string()),
            ScanError::Qi(e) => ScanErrorKind::PiiDetection(e.to_string()),
            ScanError::JobNotFound(id) => ScanErrorKind::NotFound(id.clone()),
            ScanError::JobNotReady(id, phase) => {
                ScanErrorKind::NotReady(format!("job {id} still in phase {phase}"))
            }
            ScanError::UnsupportedFormat(format) => ScanErrorKind::UnsupportedFormat(format.clone()),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        ScanError::Kind(ScanErrorKind::InvalidRequest(message.into()))
    }

    pub fn cancelled() -> Self {
        ScanError::Kind(ScanErrorKind::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;

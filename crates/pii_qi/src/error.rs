//! Error types for quasi-identifier analysis.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, QiError>;

#[derive(Error, Debug)]
pub enum QiError {
    #[error("quasi-identifier analysis requires matching sample counts: {0}")]
    MismatchedSamples(String),
}

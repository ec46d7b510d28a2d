//! Error types for the detection layer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DetectError>;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("regex compilation failed: {0}")]
    Regex(#[from] regex::Error),

    #[error("NER request failed: {0}")]
    Ner(String),

    #[error("NER request timed out")]
    Timeout,

    #[error("invalid strategy configuration: {0}")]
    Config(String),
}

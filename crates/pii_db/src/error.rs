//! Error types for the database layer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("schema introspection failed: {0}")]
    Introspection(String),

    #[error("column sampling failed: {0}")]
    Sampling(String),

    #[error("unsupported driver: {0}")]
    UnsupportedDriver(String),
}

impl DbError {
    pub fn introspection(msg: impl Into<String>) -> Self {
        Self::Introspection(msg.into())
    }

    pub fn sampling(msg: impl Into<String>) -> Self {
        Self::Sampling(msg.into())
    }
}

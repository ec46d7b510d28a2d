//! Live-connection schema introspection and column sampling.
//!
//! This crate is the only one in the workspace that talks to a real
//! database. It exposes three things to `pii_core`: the `ConnectionProvider`
//! port, `MetadataExtractor` (schema -> `SchemaSnapshot`), and `ColumnSampler`
//! (column -> `SampleData`). Everything downstream of sampling works against
//! `pii_protocol` types only.

pub mod connection;
pub mod error;
pub mod metadata;
pub mod parallel_sampler;
pub mod sampler;
pub mod types;

pub use connection::{ConnectionProvider, ScopedConnection, SqlxConnectionProvider, static_provider};
pub use error::{DbError, Result};
pub use metadata::MetadataExtractor;
pub use parallel_sampler::{ParallelSampler, SamplerEvent};
pub use sampler::ColumnSampler;
pub use types::DbKind;

//! Wire-stable types shared by every crate in the PII scanning engine:
//! identifiers, schema metadata, sampling/detection/report DTOs, scan
//! requests, progress events, and the error vocabulary.
//!
//! This crate does no I/O. It exists so `pii_db`, `pii_detect`, `pii_qi`,
//! and `pii_core` can all speak the same types without `pii_core` needing
//! to be their common dependency.

pub mod config;
pub mod detect;
pub mod error;
pub mod event;
pub mod ids;
pub mod job;
pub mod pii_type;
pub mod qi;
pub mod report;
pub mod request;
pub mod sample;
pub mod schema;

pub use config::{CircuitBreakerConfig, DetectionConfig, NerConfig, QiConfig, SamplingConfig, ScanConfig};
pub use detect::{DetectionResult, PiiCandidate, QiMembership};
pub use error::ScanErrorKind;
pub use event::{ScanEvent, ScanEventKind};
pub use ids::{ColumnRef, ConnectionId, JobId};
pub use job::{Job, Phase};
pub use pii_type::{PiiType, StrategyId};
pub use qi::{ClusteringMethod, QuasiIdentifierGroup};
pub use report::{ComplianceReport, PiiFinding, ReportCounts};
pub use request::ScanRequest;
pub use sample::{SampleData, SampleValue, SamplingMethod};
pub use schema::{
    ColumnDescriptor, ColumnId, Relationship, SchemaSnapshot, TableDescriptor, TableId, TableKind,
    TypeCategory,
};

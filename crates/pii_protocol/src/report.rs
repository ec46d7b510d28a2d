//! The final compliance report artifact.

use crate::config::ScanConfig;
use crate::ids::ColumnRef;
use crate::pii_type::{PiiType, StrategyId};
use crate::qi::QuasiIdentifierGroup;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One reported PII finding: the filtered, report-facing projection of a
/// `DetectionResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiiFinding {
    pub column_ref: ColumnRef,
    pub pii_type: PiiType,
    pub confidence: f64,
    pub strategy_id: StrategyId,
    pub evidence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportCounts {
    pub tables: u64,
    pub columns: u64,
    pub pii_columns: u64,
    pub qi_columns: u64,
}

/// Immutable once emitted. `ReportBuilder` is pure: identical inputs
/// produce byte-identical reports apart from the timestamp fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub scan_id: String,
    pub db_product_name: String,
    pub db_product_version: String,
    pub catalog: String,
    pub schema: String,
    pub counts: ReportCounts,
    pub scan_started_at: DateTime<Utc>,
    pub scan_ended_at: DateTime<Utc>,
    pub config_snapshot: ScanConfig,
    /// Sorted by descending `confidence`; ties broken by `(piiType,
    /// fullyQualifiedName)` ascending.
    pub findings: Vec<PiiFinding>,
    /// Sorted by descending `re_identification_risk`.
    pub qi_groups: Vec<QuasiIdentifierGroup>,
}

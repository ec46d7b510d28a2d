//! Scan submission request.

use crate::config::{DetectionConfig, QiConfig, SamplingConfig};
use crate::ids::ConnectionId;
use serde::{Deserialize, Serialize};

/// Partial overrides a caller may supply on submission; fields left `None`
/// fall back to the library default for that value. `ScanOrchestrator`
/// merges these into a `ScanConfig` before the job's first phase runs, and
/// that merged config is what `ReportBuilder` later snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    pub connection_id: ConnectionId,
    /// `(schema, table)` pairs to restrict the scan to. Empty means all
    /// tables in the connection's default schema.
    pub target_tables: Vec<(String, String)>,
    pub sampling: Option<SamplingConfig>,
    pub detection: Option<DetectionConfig>,
    pub qi: Option<QiConfig>,
}

impl ScanRequest {
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            target_tables: Vec::new(),
            sampling: None,
            detection: None,
            qi: None,
        }
    }
}

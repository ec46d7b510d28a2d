//! `ProgressBus` event payloads.

use crate::ids::{ColumnRef, JobId};
use crate::job::Phase;
use crate::pii_type::PiiType;
use serde::{Deserialize, Serialize};

/// One event published by the orchestrator for a given job. Carries a
/// monotonically increasing per-job sequence number so subscribers can
/// detect drops from a best-effort bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEvent {
    pub job_id: JobId,
    pub sequence: u64,
    pub kind: ScanEventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanEventKind {
    PhaseChanged { phase: Phase, message: String },
    ColumnStarted { column: ColumnRef },
    ColumnCompleted { column: ColumnRef },
    PiiDetected { column: ColumnRef, pii_type: PiiType, confidence: f64 },
    QiGroupFormed { group_id: String, members: Vec<ColumnRef> },
    /// Overall progress within the current phase, `processed/total`.
    ProgressUpdated { processed: u64, total: u64 },
    ScanCompleted { tables: u64, columns: u64, pii_columns: u64, qi_columns: u64 },
    ScanFailed { reason: String },
}

impl ScanEventKind {
    pub fn progress_ratio(&self) -> Option<f64> {
        match self {
            Self::ProgressUpdated { processed, total } if *total > 0 => {
                Some(*processed as f64 / *total as f64)
            }
            Self::ProgressUpdated { .. } => Some(1.0),
            _ => None,
        }
    }
}

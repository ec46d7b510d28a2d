//! Job lifecycle types: `Phase` and `Job`.

use crate::ids::{ConnectionId, JobId};
use crate::request::ScanRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Total order of scan phases. Non-terminal phases may only advance to the
/// next phase in this order or jump straight to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Pending,
    ExtractingMetadata,
    Sampling,
    DetectingPii,
    GeneratingReport,
    Completed,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// The phase immediately following this one on the happy path, or
    /// `None` if this phase is already terminal.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::ExtractingMetadata),
            Self::ExtractingMetadata => Some(Self::Sampling),
            Self::Sampling => Some(Self::DetectingPii),
            Self::DetectingPii => Some(Self::GeneratingReport),
            Self::GeneratingReport => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::ExtractingMetadata => "EXTRACTING_METADATA",
            Self::Sampling => "SAMPLING",
            Self::DetectingPii => "DETECTING_PII",
            Self::GeneratingReport => "GENERATING_REPORT",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

/// A point-in-time snapshot of one job. Returned by `status`/`list`; the
/// live `Job` inside the orchestrator is mutated only by the driver task
/// that owns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub connection_id: ConnectionId,
    pub request: ScanRequest,
    pub phase: Phase,
    pub created_at: DateTime<Utc>,
    pub last_transition: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// `Some` only once `phase == Completed`.
    pub report: Option<crate::report::ComplianceReport>,
}

impl Job {
    pub fn new(id: JobId, request: ScanRequest) -> Self {
        let now = Utc::now();
        Self {
            id,
            connection_id: request.connection_id.clone(),
            request,
            phase: Phase::Pending,
            created_at: now,
            last_transition: now,
            ended_at: None,
            error_message: None,
            report: None,
        }
    }
}

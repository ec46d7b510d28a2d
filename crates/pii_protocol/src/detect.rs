//! Detection output types: `PiiCandidate` and `DetectionResult`.

use crate::ids::ColumnRef;
use crate::pii_type::{PiiType, StrategyId};
use serde::{Deserialize, Serialize};

/// One strategy's verdict for one PII type on one column. Immutable once
/// produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiiCandidate {
    pub pii_type: PiiType,
    pub confidence: f64,
    pub strategy_id: StrategyId,
    /// Free-form supporting detail (matched rule name, sample match count, …).
    pub evidence: String,
}

impl PiiCandidate {
    pub fn new(pii_type: PiiType, confidence: f64, strategy_id: StrategyId, evidence: impl Into<String>) -> Self {
        debug_assert!((0.0..=1.0).contains(&confidence));
        Self {
            pii_type,
            confidence: confidence.clamp(0.0, 1.0),
            strategy_id,
            evidence: evidence.into(),
        }
    }
}

/// Per-column contribution to a `QuasiIdentifierGroup`, attached to the
/// owning column's `DetectionResult` once QI analysis has run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QiMembership {
    pub group_id: String,
    pub risk_score: f64,
    pub correlated_columns: Vec<ColumnRef>,
}

/// Aggregated detection outcome for one column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub column_ref: ColumnRef,
    /// Every candidate produced by every strategy that ran, kept for
    /// diagnostics even though the report only ever shows the filtered view.
    pub candidates: Vec<PiiCandidate>,
    pub is_pii: bool,
    pub strategy_errors: Vec<String>,
    pub quasi_identifier: Option<QiMembership>,
}

impl DetectionResult {
    pub fn empty(column_ref: ColumnRef) -> Self {
        Self {
            column_ref,
            candidates: Vec::new(),
            is_pii: false,
            strategy_errors: Vec::new(),
            quasi_identifier: None,
        }
    }

    /// The candidate with the maximal confidence, ties broken by strategy
    /// priority (`HEURISTIC > REGEX > NER`).
    pub fn highest_confidence(&self) -> Option<&PiiCandidate> {
        self.candidates.iter().max_by(|a, b| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.strategy_id.priority_rank().cmp(&a.strategy_id.priority_rank()))
        })
    }

    pub fn highest_confidence_type(&self) -> Option<PiiType> {
        self.highest_confidence().map(|c| c.pii_type)
    }

    pub fn highest_confidence_score(&self) -> f64 {
        self.highest_confidence().map(|c| c.confidence).unwrap_or(0.0)
    }

    /// Candidates at or above `reporting_threshold`, sorted by descending
    /// confidence. This is the view a `ComplianceReport` shows; the full
    /// `candidates` list stays internal.
    pub fn reported_candidates(&self, reporting_threshold: f64) -> Vec<&PiiCandidate> {
        let mut v: Vec<&PiiCandidate> = self
            .candidates
            .iter()
            .filter(|c| c.confidence >= reporting_threshold)
            .collect();
        v.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        v
    }

    pub fn is_quasi_identifier(&self) -> bool {
        self.quasi_identifier.is_some()
    }
}

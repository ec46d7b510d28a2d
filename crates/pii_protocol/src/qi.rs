//! Quasi-identifier group types.

use crate::ids::ColumnRef;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusteringMethod {
    /// Connected components over a pairwise-correlation graph.
    CorrelationGraph,
}

/// A cluster of non-PII columns whose combination can re-identify subjects.
///
/// Invariant: a column belongs to at most one `QuasiIdentifierGroup`; when a
/// column would qualify for more than one, it is assigned to the group with
/// the higher `re_identification_risk`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuasiIdentifierGroup {
    pub group_id: String,
    pub members: Vec<ColumnRef>,
    pub clustering_method: ClusteringMethod,
    pub distinct_combinations: u64,
    pub singleton_combinations: u64,
    pub re_identification_risk: f64,
    pub k_anonymity_estimate: f64,
    /// Per-column normalized-entropy contribution, indexed the same as `members`.
    pub contribution_scores: Vec<f64>,
}

impl QuasiIdentifierGroup {
    pub fn contribution_of(&self, column: &ColumnRef) -> Option<f64> {
        self.members
            .iter()
            .position(|m| m == column)
            .and_then(|i| self.contribution_scores.get(i).copied())
    }
}

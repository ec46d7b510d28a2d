//! The `DetectionStrategy` trait every strategy family implements.

use crate::error::Result;
use async_trait::async_trait;
use pii_protocol::{ColumnDescriptor, PiiCandidate, SampleData, StrategyId};

/// One PII-detection technique. The pipeline runs strategies in priority
/// order (`HEURISTIC` -> `REGEX` -> `NER`) over the same column/sample pair
/// and aggregates whatever candidates each one returns.
///
/// A strategy returning `Err` annotates the column's `strategy_errors` but
/// never fails the scan outright — detection is best-effort per strategy.
#[async_trait]
pub trait DetectionStrategy: Send + Sync {
    fn id(&self) -> StrategyId;

    async fn detect(&self, column: &ColumnDescriptor, sample: &SampleData) -> Result<Vec<PiiCandidate>>;
}

//! `PiiPipeline`: runs the configured strategies over one column/sample
//! pair in priority order and aggregates their candidates into a
//! `DetectionResult`.

use crate::strategy::DetectionStrategy;
use pii_protocol::{ColumnDescriptor, DetectionConfig, DetectionResult, SampleData, StrategyId};
use tracing::debug;

pub struct PiiPipeline {
    strategies: Vec<Box<dyn DetectionStrategy>>,
    stop_on_high_confidence: bool,
    reporting_threshold: f64,
    heuristic_threshold: f64,
    regex_threshold: f64,
    ner_threshold: f64,
}

impl PiiPipeline {
    pub fn new(strategies: Vec<Box<dyn DetectionStrategy>>, config: &DetectionConfig) -> Self {
        Self {
            strategies,
            stop_on_high_confidence: config.stop_on_high_confidence,
            reporting_threshold: config.reporting_threshold,
            heuristic_threshold: config.heuristic_threshold,
            regex_threshold: config.regex_threshold,
            ner_threshold: config.ner_threshold,
        }
    }

    /// Each strategy's own confidence threshold, used for `isPii` (as
    /// opposed to `reporting_threshold`, which only gates what the report
    /// shows).
    fn threshold_for(&self, strategy_id: StrategyId) -> f64 {
        match strategy_id {
            StrategyId::Heuristic => self.heuristic_threshold,
            StrategyId::Regex => self.regex_threshold,
            StrategyId::Ner => self.ner_threshold,
        }
    }

    /// Runs every configured strategy in order, unless `stopOnHighConfidence`
    /// is set and an earlier strategy already produced a candidate at or
    /// above `reportingThreshold` — in which case later (more expensive)
    /// strategies are skipped entirely for this column.
    pub async fn run(&self, column: &ColumnDescriptor, sample: &SampleData) -> DetectionResult {
        let mut result = DetectionResult::empty(column.column_ref.clone());

        for strategy in &self.strategies {
            match strategy.detect(column, sample).await {
                Ok(candidates) => result.candidates.extend(candidates),
                Err(e) => {
                    debug!(column = %column.column_ref, strategy = %strategy.id(), error = %e, "detection strategy failed");
                    result.strategy_errors.push(format!("{}: {e}", strategy.id()));
                }
            }

            if self.stop_on_high_confidence && result.highest_confidence_score() >= self.reporting_threshold {
                break;
            }
        }

        // isPii is true iff any candidate clears *its own* strategy's
        // threshold, not the (generally higher) reporting threshold that
        // only gates which candidates the report shows.
        result.is_pii = result.candidates.iter().any(|c| c.confidence >= self.threshold_for(c.strategy_id));
        result
    }
}

//! `RegexStrategy`: matches sampled *values* against a catalog of PII-shaped
//! patterns. Runs after `HeuristicStrategy` since it needs to have pulled a
//! sample first, and is more expensive per column.

use crate::error::Result;
use crate::regex_catalog::{passes_luhn, COMPILED_RULES, CREDIT_CARD_REGEX};
use crate::strategy::DetectionStrategy;
use async_trait::async_trait;
use pii_protocol::{ColumnDescriptor, PiiCandidate, PiiType, SampleData, StrategyId};

pub struct RegexStrategy {
    pub threshold: f64,
}

impl RegexStrategy {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

#[async_trait]
impl DetectionStrategy for RegexStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::Regex
    }

    async fn detect(&self, _column: &ColumnDescriptor, sample: &SampleData) -> Result<Vec<PiiCandidate>> {
        let values: Vec<&str> = sample.samples.iter().flatten().map(String::as_str).collect();
        if values.is_empty() {
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();

        for (name, pii_type, re, _base_confidence) in COMPILED_RULES.iter() {
            let matches = values.iter().filter(|v| re.is_match(v.trim())).count();
            if matches == 0 {
                continue;
            }

            let confidence = matches as f64 / values.len() as f64;
            if confidence < self.threshold {
                continue;
            }

            candidates.push(PiiCandidate::new(
                *pii_type,
                confidence,
                StrategyId::Regex,
                format!("{name} matched {matches}/{} sampled values", values.len()),
            ));
        }

        let digit_matches: Vec<&str> = values.iter().filter(|v| CREDIT_CARD_REGEX.is_match(v.trim())).copied().collect();
        if !digit_matches.is_empty() {
            let luhn_passes = digit_matches.iter().filter(|v| passes_luhn(v.trim())).count();
            if luhn_passes > 0 {
                let confidence = luhn_passes as f64 / values.len() as f64;
                if confidence >= self.threshold {
                    candidates.push(PiiCandidate::new(
                        PiiType::CreditCard,
                        confidence,
                        StrategyId::Regex,
                        format!("{luhn_passes}/{} sampled values are digit strings passing the Luhn check", values.len()),
                    ));
                }
            }
        }

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pii_protocol::{ColumnId, ColumnRef, TableId, TypeCategory};

    fn column() -> ColumnDescriptor {
        ColumnDescriptor {
            id: ColumnId(0),
            table_id: TableId(0),
            column_ref: ColumnRef::new("public", "users", "contact"),
            type_category: TypeCategory::String,
            native_type: "varchar".into(),
            nullable: true,
            primary_key: false,
            size: None,
            scale: None,
            comment: None,
            is_foreign_key: false,
        }
    }

    fn sample_of(values: &[&str]) -> SampleData {
        SampleData {
            column_ref: ColumnRef::new("public", "users", "contact"),
            samples: values.iter().map(|v| Some(v.to_string())).collect(),
            total_row_count: values.len() as u64,
            null_count: 0,
            entropy: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn all_values_matching_email_pattern_is_detected() {
        let strategy = RegexStrategy::new(0.8);
        let sample = sample_of(&["a@example.com", "b@example.com", "c@example.org"]);
        let candidates = strategy.detect(&column(), &sample).await.unwrap();
        assert!(candidates.iter().any(|c| c.pii_type == PiiType::Email));
    }

    #[tokio::test]
    async fn valid_luhn_cards_are_detected_as_credit_card() {
        let strategy = RegexStrategy::new(0.5);
        let sample = sample_of(&["4111111111111111", "5500005555555559"]);
        let candidates = strategy.detect(&column(), &sample).await.unwrap();
        assert!(candidates.iter().any(|c| c.pii_type == PiiType::CreditCard));
    }

    #[tokio::test]
    async fn non_matching_values_produce_no_candidates() {
        let strategy = RegexStrategy::new(0.5);
        let sample = sample_of(&["hello", "world"]);
        let candidates = strategy.detect(&column(), &sample).await.unwrap();
        assert!(candidates.is_empty());
    }
}

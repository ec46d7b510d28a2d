//! `HeuristicStrategy`: matches a column's name (and comment, if the driver
//! reported one) against a catalog of naming conventions.
//!
//! Runs first in the pipeline since it's nearly free (no value inspection)
//! and catches the common case — most PII columns are named what they are.

use crate::error::Result;
use crate::strategy::DetectionStrategy;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use pii_protocol::{ColumnDescriptor, PiiCandidate, PiiType, SampleData, StrategyId};
use regex::Regex;

struct HeuristicRule {
    pattern: &'static str,
    pii_type: PiiType,
    base_confidence: f64,
}

const RULES: &[HeuristicRule] = &[
    HeuristicRule { pattern: r"(?i)e[-_]?mail", pii_type: PiiType::Email, base_confidence: 0.9 },
    HeuristicRule { pattern: r"(?i)ssn|social_?sec", pii_type: PiiType::Ssn, base_confidence: 0.9 },
    HeuristicRule { pattern: r"(?i)phone|mobile|tel(ephone)?", pii_type: PiiType::Phone, base_confidence: 0.8 },
    HeuristicRule { pattern: r"(?i)first_?name|last_?name|full_?name|surname", pii_type: PiiType::Name, base_confidence: 0.75 },
    HeuristicRule { pattern: r"(?i)address|street|addr1|addr2", pii_type: PiiType::Address, base_confidence: 0.75 },
    HeuristicRule { pattern: r"(?i)dob|birth_?date|date_of_birth", pii_type: PiiType::DateOfBirth, base_confidence: 0.85 },
    HeuristicRule { pattern: r"(?i)zip|postal", pii_type: PiiType::PostalCode, base_confidence: 0.6 },
    HeuristicRule { pattern: r"(?i)credit_?card|card_?num(ber)?|pan", pii_type: PiiType::CreditCard, base_confidence: 0.85 },
    HeuristicRule { pattern: r"(?i)iban|account_?num(ber)?", pii_type: PiiType::Iban, base_confidence: 0.6 },
    HeuristicRule { pattern: r"(?i)ip_?addr(ess)?", pii_type: PiiType::IpAddress, base_confidence: 0.7 },
    HeuristicRule { pattern: r"(?i)passport|national_?id|ssn_?id", pii_type: PiiType::NationalId, base_confidence: 0.85 },
    HeuristicRule { pattern: r"(?i)gender|sex", pii_type: PiiType::Gender, base_confidence: 0.5 },
];

static COMPILED_RULES: Lazy<Vec<(Regex, PiiType, f64)>> = Lazy::new(|| {
    RULES
        .iter()
        .map(|r| (Regex::new(r.pattern).expect("heuristic rule pattern is valid"), r.pii_type, r.base_confidence))
        .collect()
});

pub struct HeuristicStrategy {
    pub threshold: f64,
}

impl HeuristicStrategy {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

#[async_trait]
impl DetectionStrategy for HeuristicStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::Heuristic
    }

    async fn detect(&self, column: &ColumnDescriptor, sample: &SampleData) -> Result<Vec<PiiCandidate>> {
        let name = &column.column_ref.column;
        let non_null_factor = non_null_factor(sample);

        let mut candidates = Vec::new();
        for (re, pii_type, base_confidence) in COMPILED_RULES.iter() {
            let name_hit = re.is_match(name);
            let comment_hit = column.comment.as_deref().is_some_and(|c| re.is_match(c));
            if !name_hit && !comment_hit {
                continue;
            }

            let confidence = base_confidence * non_null_factor;
            if confidence < self.threshold {
                continue;
            }

            candidates.push(PiiCandidate::new(
                *pii_type,
                confidence,
                StrategyId::Heuristic,
                format!("column name/comment matched naming convention for {pii_type}"),
            ));
        }

        Ok(candidates)
    }
}

/// Mostly-null columns are weaker evidence for a naming-convention match:
/// a column that's named `ssn` but is 95% null in the sample is less
/// convincing than one that's fully populated. Floors at 0.5 so a column
/// with at least some non-null data never gets fully discounted.
fn non_null_factor(sample: &SampleData) -> f64 {
    if sample.samples.is_empty() {
        return 1.0;
    }
    let ratio = sample.non_null_count() as f64 / sample.samples.len() as f64;
    0.5 + 0.5 * ratio
}

#[cfg(test)]
mod tests {
    use super::*;
    use pii_protocol::{ColumnId, ColumnRef, TableId, TypeCategory};

    fn column(name: &str) -> ColumnDescriptor {
        ColumnDescriptor {
            id: ColumnId(0),
            table_id: TableId(0),
            column_ref: ColumnRef::new("public", "users", name),
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

    fn full_sample(n: usize) -> SampleData {
        SampleData {
            column_ref: ColumnRef::new("public", "users", "x"),
            samples: (0..n).map(|i| Some(i.to_string())).collect(),
            total_row_count: n as u64,
            null_count: 0,
            entropy: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn email_column_name_matches() {
        let strategy = HeuristicStrategy::new(0.7);
        let candidates = strategy.detect(&column("email_address"), &full_sample(10)).await.unwrap();
        assert!(candidates.iter().any(|c| c.pii_type == PiiType::Email));
    }

    #[tokio::test]
    async fn unrelated_column_name_has_no_candidates() {
        let strategy = HeuristicStrategy::new(0.7);
        let candidates = strategy.detect(&column("created_at"), &full_sample(10)).await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn mostly_null_column_is_discounted_below_threshold() {
        let strategy = HeuristicStrategy::new(0.7);
        let mut sample = full_sample(20);
        for s in sample.samples.iter_mut().take(19) {
            *s = None;
        }
        sample.null_count = 19;
        // base 0.9 * factor(0.5 + 0.5*0.05 = 0.525) = 0.4725, below threshold
        let candidates = strategy.detect(&column("email_address"), &sample).await.unwrap();
        assert!(candidates.is_empty());
    }
}

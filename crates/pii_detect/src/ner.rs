//! `NerStrategy`: calls an external named-entity-recognition service over
//! the sampled values. Guarded by a `CircuitBreaker` so a flaky or
//! unreachable NER endpoint degrades to "this strategy contributed nothing"
//! rather than stalling every column behind retries.

use crate::circuit_breaker::CircuitBreaker;
use crate::error::{DetectError, Result};
use crate::strategy::DetectionStrategy;
use async_trait::async_trait;
use pii_protocol::{ColumnDescriptor, NerConfig, PiiCandidate, PiiType, SampleData, StrategyId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// One entity label returned by the NER service for one input value.
#[derive(Debug, Clone, Deserialize)]
pub struct NerEntity {
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Serialize)]
struct NerRequest<'a> {
    values: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct NerResponse {
    /// One (possibly empty) list of entities per input value, same order
    /// and length as the request's `values`.
    entities: Vec<Vec<NerEntity>>,
}

/// Port to the NER backend, so tests can substitute a fake without a live
/// HTTP endpoint.
#[async_trait]
pub trait NerClient: Send + Sync {
    async fn classify(&self, values: &[&str]) -> std::result::Result<Vec<Vec<NerEntity>>, String>;
}

pub struct HttpNerClient {
    client: reqwest::Client,
    url: String,
}

impl HttpNerClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), url: url.into() }
    }
}

#[async_trait]
impl NerClient for HttpNerClient {
    async fn classify(&self, values: &[&str]) -> std::result::Result<Vec<Vec<NerEntity>>, String> {
        let response = self
            .client
            .post(&self.url)
            .json(&NerRequest { values })
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("NER service returned status {}", response.status()));
        }

        let body: NerResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(body.entities)
    }
}

pub struct NerStrategy {
    client: Box<dyn NerClient>,
    breaker: Arc<CircuitBreaker>,
    max_samples: usize,
    timeout: Duration,
    threshold: f64,
}

impl NerStrategy {
    /// `breaker` is shared across jobs rather than owned per-strategy: the
    /// NER circuit breaker is process-wide, so a string of failures in one
    /// scan keeps the next scan's NER strategy tripped until the reset
    /// timeout elapses. Callers get the shared breaker from the
    /// `NerClientFactory` that built the `client`.
    pub fn new(client: Box<dyn NerClient>, breaker: Arc<CircuitBreaker>, config: &NerConfig, threshold: f64) -> Self {
        Self {
            client,
            breaker,
            max_samples: config.max_samples,
            timeout: Duration::from_secs(config.timeout_seconds),
            threshold,
        }
    }
}

#[async_trait]
impl DetectionStrategy for NerStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::Ner
    }

    async fn detect(&self, _column: &ColumnDescriptor, sample: &SampleData) -> Result<Vec<PiiCandidate>> {
        let values: Vec<&str> = sample
            .samples
            .iter()
            .flatten()
            .map(String::as_str)
            .take(self.max_samples)
            .collect();

        if values.is_empty() {
            return Ok(Vec::new());
        }

        if self.breaker.is_open() {
            // An open breaker is a normal degraded state, not a strategy
            // failure: fail fast with no candidates and no network I/O.
            return Ok(Vec::new());
        }

        let outcome = tokio::time::timeout(self.timeout, self.client.classify(&values)).await;

        let per_value = match outcome {
            Err(_) => {
                self.breaker.record_failure();
                return Err(DetectError::Timeout);
            }
            Ok(Err(msg)) => {
                self.breaker.record_failure();
                warn!(error = %msg, "NER request failed");
                return Err(DetectError::Ner(msg));
            }
            Ok(Ok(entities)) => {
                self.breaker.record_success();
                entities
            }
        };

        Ok(aggregate(&per_value, values.len(), self.threshold))
    }
}

/// Tallies the top entity label per value, then reports a candidate per
/// label whose support ratio clears `threshold` once scaled by the mean
/// entity score.
fn aggregate(per_value: &[Vec<NerEntity>], total_values: usize, threshold: f64) -> Vec<PiiCandidate> {
    use std::collections::HashMap;

    let mut tally: HashMap<&str, (usize, f64)> = HashMap::new();
    for entities in per_value {
        if let Some(top) = entities.iter().max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal)) {
            let entry = tally.entry(top.label.as_str()).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += top.score;
        }
    }

    tally
        .into_iter()
        .filter_map(|(label, (count, score_sum))| {
            let support_ratio = count as f64 / total_values as f64;
            let mean_score = score_sum / count as f64;
            let confidence = support_ratio * mean_score;
            if confidence < threshold {
                return None;
            }
            Some(PiiCandidate::new(
                map_label(label),
                confidence,
                StrategyId::Ner,
                format!("NER labeled {count}/{total_values} sampled values as {label}"),
            ))
        })
        .collect()
}

fn map_label(label: &str) -> PiiType {
    match label.to_ascii_uppercase().as_str() {
        "PERSON" | "NAME" => PiiType::Name,
        "EMAIL" => PiiType::Email,
        "PHONE" | "PHONE_NUMBER" => PiiType::Phone,
        "LOCATION" | "GPE" | "ADDRESS" => PiiType::Address,
        "SSN" | "US_SSN" => PiiType::Ssn,
        "CREDIT_CARD" => PiiType::CreditCard,
        "IBAN" | "IBAN_CODE" => PiiType::Iban,
        "IP_ADDRESS" => PiiType::IpAddress,
        "DATE_OF_BIRTH" | "DOB" => PiiType::DateOfBirth,
        _ => PiiType::Other("NER_ENTITY"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pii_protocol::{CircuitBreakerConfig, ColumnId, ColumnRef, TableId, TypeCategory};

    enum FakeOutcome {
        Entities(Vec<Vec<(&'static str, f64)>>),
        Failure(&'static str),
    }

    struct FakeClient {
        outcome: FakeOutcome,
    }

    #[async_trait]
    impl NerClient for FakeClient {
        async fn classify(&self, _values: &[&str]) -> std::result::Result<Vec<Vec<NerEntity>>, String> {
            match &self.outcome {
                FakeOutcome::Entities(rows) => Ok(rows
                    .iter()
                    .map(|row| row.iter().map(|&(label, score)| NerEntity { label: label.into(), score }).collect())
                    .collect()),
                FakeOutcome::Failure(msg) => Err((*msg).to_string()),
            }
        }
    }

    fn ner_config() -> NerConfig {
        NerConfig {
            url: String::new(),
            timeout_seconds: 5,
            max_samples: 50,
            retry_attempts: 0,
            circuit_breaker: CircuitBreakerConfig { failure_threshold: 3, reset_timeout_seconds: 60 },
        }
    }

    fn column() -> ColumnDescriptor {
        ColumnDescriptor {
            id: ColumnId(0),
            table_id: TableId(0),
            column_ref: ColumnRef::new("public", "users", "bio"),
            type_category: TypeCategory::String,
            native_type: "text".into(),
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
            column_ref: ColumnRef::new("public", "users", "bio"),
            samples: values.iter().map(|v| Some(v.to_string())).collect(),
            total_row_count: values.len() as u64,
            null_count: 0,
            entropy: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn successful_classification_produces_candidate() {
        let client = FakeClient {
            outcome: FakeOutcome::Entities(vec![vec![("PERSON", 0.95)], vec![("PERSON", 0.9)]]),
        };
        let breaker = Arc::new(CircuitBreaker::new(&ner_config().circuit_breaker));
        let strategy = NerStrategy::new(Box::new(client), breaker, &ner_config(), 0.5);
        let candidates = strategy.detect(&column(), &sample_of(&["Jane Doe", "John Roe"])).await.unwrap();
        assert!(candidates.iter().any(|c| c.pii_type == PiiType::Name));
    }

    #[tokio::test]
    async fn failure_propagates_as_strategy_error() {
        let client = FakeClient { outcome: FakeOutcome::Failure("connection refused") };
        let breaker = Arc::new(CircuitBreaker::new(&ner_config().circuit_breaker));
        let strategy = NerStrategy::new(Box::new(client), breaker, &ner_config(), 0.5);
        let result = strategy.detect(&column(), &sample_of(&["x"])).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn circuit_opens_after_repeated_failures() {
        let client = FakeClient { outcome: FakeOutcome::Failure("down") };
        let breaker = Arc::new(CircuitBreaker::new(&ner_config().circuit_breaker));
        let strategy = NerStrategy::new(Box::new(client), breaker, &ner_config(), 0.5);
        for _ in 0..3 {
            let _ = strategy.detect(&column(), &sample_of(&["x"])).await;
        }
        // Fails fast with an empty candidate list once open, not an error.
        let result = strategy.detect(&column(), &sample_of(&["x"])).await;
        assert!(result.unwrap().is_empty());
    }

    #[tokio::test]
    async fn breaker_is_shared_across_strategy_instances_built_from_the_same_handle() {
        let breaker = Arc::new(CircuitBreaker::new(&ner_config().circuit_breaker));
        let first = NerStrategy::new(
            Box::new(FakeClient { outcome: FakeOutcome::Failure("down") }),
            breaker.clone(),
            &ner_config(),
            0.5,
        );
        for _ in 0..3 {
            let _ = first.detect(&column(), &sample_of(&["x"])).await;
        }
        assert_eq!(breaker.trip_count(), 1);

        // A second strategy built with the same breaker handle (standing in
        // for the next job reusing the process-wide breaker) sees it already open.
        let second = NerStrategy::new(
            Box::new(FakeClient { outcome: FakeOutcome::Entities(vec![vec![("PERSON", 0.9)]]) }),
            breaker,
            &ner_config(),
            0.5,
        );
        let result = second.detect(&column(), &sample_of(&["x"])).await;
        assert!(result.unwrap().is_empty());
    }
}

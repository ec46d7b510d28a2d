//! Effective, post-default configuration for one scan.
//!
//! These are the values a `ComplianceReport`'s config snapshot records —
//! the values actually used, never the library defaults as a separate
//! concept once merged.

use crate::sample::SamplingMethod;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub sample_size: u32,
    pub method: SamplingMethod,
    pub max_concurrent_db_queries: usize,
    pub entropy_enabled: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_size: 100,
            method: SamplingMethod::Random,
            max_concurrent_db_queries: 4,
            entropy_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout_seconds: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NerConfig {
    pub url: String,
    pub timeout_seconds: u64,
    pub max_samples: usize,
    pub retry_attempts: u32,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for NerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_seconds: 30,
            max_samples: 50,
            retry_attempts: 2,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub heuristic_threshold: f64,
    pub regex_threshold: f64,
    pub ner_threshold: f64,
    pub reporting_threshold: f64,
    pub stop_on_high_confidence: bool,
    pub ner: NerConfig,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            heuristic_threshold: 0.7,
            regex_threshold: 0.8,
            ner_threshold: 0.6,
            reporting_threshold: 0.85,
            stop_on_high_confidence: true,
            ner: NerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QiConfig {
    pub enabled: bool,
    pub max_distinct_ratio: f64,
    pub min_distinct_count: u64,
    pub min_correlation_coefficient: f64,
    pub max_columns_to_analyze: usize,
    pub qi_hints: Vec<String>,
}

impl Default for QiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_distinct_ratio: 0.8,
            min_distinct_count: 3,
            min_correlation_coefficient: 0.7,
            max_columns_to_analyze: 100,
            qi_hints: [
                "zip", "postal_code", "city", "state", "gender", "age", "dob", "birth_date",
                "country", "nationality", "marital_status", "occupation",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// The full, effective configuration for a single scan. Every field here is
/// what was actually used, after merging request overrides onto defaults —
/// this is exactly what `ReportBuilder` snapshots into the final report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    pub sampling: SamplingConfig,
    pub detection: DetectionConfig,
    pub qi: QiConfig,
}

fn unit_interval(name: &str, value: f64) -> Result<(), String> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("{name} must be in [0, 1], got {value}"))
    }
}

impl SamplingConfig {
    fn validate(&self) -> Result<(), String> {
        if self.sample_size == 0 {
            return Err("sample_size must be greater than 0".into());
        }
        if self.max_concurrent_db_queries == 0 {
            return Err("max_concurrent_db_queries must be greater than 0".into());
        }
        Ok(())
    }
}

impl DetectionConfig {
    fn validate(&self) -> Result<(), String> {
        unit_interval("heuristic_threshold", self.heuristic_threshold)?;
        unit_interval("regex_threshold", self.regex_threshold)?;
        unit_interval("ner_threshold", self.ner_threshold)?;
        unit_interval("reporting_threshold", self.reporting_threshold)?;
        self.ner.validate()
    }
}

impl NerConfig {
    fn validate(&self) -> Result<(), String> {
        if self.timeout_seconds == 0 {
            return Err("ner.timeout_seconds must be greater than 0".into());
        }
        if self.max_samples == 0 {
            return Err("ner.max_samples must be greater than 0".into());
        }
        self.circuit_breaker.validate()
    }
}

impl CircuitBreakerConfig {
    fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("circuit_breaker.failure_threshold must be greater than 0".into());
        }
        if self.reset_timeout_seconds == 0 {
            return Err("circuit_breaker.reset_timeout_seconds must be greater than 0".into());
        }
        Ok(())
    }
}

impl QiConfig {
    fn validate(&self) -> Result<(), String> {
        unit_interval("max_distinct_ratio", self.max_distinct_ratio)?;
        unit_interval("min_correlation_coefficient", self.min_correlation_coefficient)?;
        if self.max_columns_to_analyze == 0 {
            return Err("max_columns_to_analyze must be greater than 0".into());
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Range-checks every field against spec.md §7's "out-of-range request
    /// fields" case for `InvalidRequest`. Called by `ScanOrchestrator::submit`
    /// against the merged, post-default config before a job is enqueued.
    pub fn validate(&self) -> Result<(), String> {
        self.sampling.validate()?;
        self.detection.validate()?;
        self.qi.validate()?;
        Ok(())
    }
}

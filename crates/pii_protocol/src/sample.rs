//! Sampling output: `SampleData` and the sampling method enum.

use crate::ids::ColumnRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SamplingMethod {
    FirstN,
    Random,
    Stratified,
}

impl Default for SamplingMethod {
    fn default() -> Self {
        Self::Random
    }
}

/// One sampled value. Nulls are preserved in place so positional alignment
/// across a table's columns (needed by the QI analyzer's tuple hashing)
/// survives sampling.
pub type SampleValue = Option<String>;

/// Result of drawing a sample from one column.
///
/// Invariant: `0 <= null_count <= samples.len() <= sample_size_requested`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleData {
    pub column_ref: ColumnRef,
    pub samples: Vec<SampleValue>,
    pub total_row_count: u64,
    pub null_count: u64,
    pub entropy: Option<f64>,
    /// Set when this column's sampling failed in a `ParallelSampler` run;
    /// the column still gets an (empty) `SampleData` so the rest of the
    /// phase can proceed.
    pub error: Option<String>,
}

impl SampleData {
    pub fn empty(column_ref: ColumnRef) -> Self {
        Self {
            column_ref,
            samples: Vec::new(),
            total_row_count: 0,
            null_count: 0,
            entropy: None,
            error: None,
        }
    }

    pub fn failed(column_ref: ColumnRef, error: impl Into<String>) -> Self {
        let mut s = Self::empty(column_ref);
        s.error = Some(error.into());
        s
    }

    pub fn non_null_count(&self) -> u64 {
        self.samples.len() as u64 - self.null_count
    }

    /// `value -> count` restricted to non-null samples, built on demand.
    pub fn value_distribution(&self) -> HashMap<&str, u64> {
        let mut dist: HashMap<&str, u64> = HashMap::new();
        for v in self.samples.iter().flatten() {
            *dist.entry(v.as_str()).or_insert(0) += 1;
        }
        dist
    }

    pub fn distinct_non_null_count(&self) -> usize {
        self.value_distribution().len()
    }
}

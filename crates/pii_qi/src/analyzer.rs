//! `QuasiIdentifierAnalyzer`: turns a table's sampled columns into
//! `QuasiIdentifierGroup`s.
//!
//! Pipeline: filter eligible columns -> pairwise correlate -> cluster via
//! connected components -> score each cluster's re-identification risk ->
//! attach per-column entropy contributions.

use crate::clustering::UnionFind;
use crate::correlation::correlate;
use crate::risk::score_group;
use pii_protocol::{ClusteringMethod, ColumnDescriptor, QiConfig, QuasiIdentifierGroup, SampleData, TypeCategory};
use tracing::warn;

pub struct QuasiIdentifierAnalyzer;

impl QuasiIdentifierAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// `columns` and `samples` must be the same length and positionally
    /// aligned (one `SampleData` per `ColumnDescriptor`), scoped to a single
    /// table — quasi-identifier correlation is only meaningful within one
    /// table's rows.
    pub fn analyze(&self, columns: &[ColumnDescriptor], samples: &[SampleData], config: &QiConfig) -> Vec<QuasiIdentifierGroup> {
        if !config.enabled || columns.len() < 2 {
            return Vec::new();
        }

        let eligible = self.eligible_indices(columns, samples, config);
        if eligible.len() < 2 {
            return Vec::new();
        }

        let eligible = if eligible.len() > config.max_columns_to_analyze {
            warn!(
                dropped = eligible.len() - config.max_columns_to_analyze,
                "quasi-identifier analysis exceeded max_columns_to_analyze, truncating"
            );
            eligible[..config.max_columns_to_analyze].to_vec()
        } else {
            eligible
        };

        let mut uf = UnionFind::new(eligible.len());
        for i in 0..eligible.len() {
            for j in (i + 1)..eligible.len() {
                let ci = eligible[i];
                let cj = eligible[j];
                let score = correlate(
                    &samples[ci].samples,
                    columns[ci].type_category,
                    &samples[cj].samples,
                    columns[cj].type_category,
                );
                if let Some(score) = score {
                    if score >= config.min_correlation_coefficient {
                        uf.union(i, j);
                    }
                }
            }
        }

        uf.components()
            .into_iter()
            .filter(|component| component.len() >= 2)
            .enumerate()
            .map(|(group_index, component)| {
                let member_indices: Vec<usize> = component.iter().map(|&local| eligible[local]).collect();
                build_group(group_index, &member_indices, columns, samples)
            })
            .collect()
    }

    fn eligible_indices(&self, columns: &[ColumnDescriptor], samples: &[SampleData], config: &QiConfig) -> Vec<usize> {
        columns
            .iter()
            .enumerate()
            .filter(|(i, col)| {
                if matches!(col.type_category, TypeCategory::Binary) {
                    return false;
                }
                let sample = &samples[*i];
                let non_null = sample.non_null_count();
                if non_null == 0 {
                    return false;
                }
                let distinct = sample.distinct_non_null_count() as u64;
                let ratio = distinct as f64 / non_null as f64;
                ratio <= config.max_distinct_ratio && distinct >= config.min_distinct_count
            })
            .map(|(i, _)| i)
            .collect()
    }
}

impl Default for QuasiIdentifierAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn build_group(
    group_index: usize,
    member_indices: &[usize],
    columns: &[ColumnDescriptor],
    samples: &[SampleData],
) -> QuasiIdentifierGroup {
    let member_samples: Vec<&[Option<String>]> = member_indices.iter().map(|&i| samples[i].samples.as_slice()).collect();
    let scores = score_group(&member_samples);

    let entropies: Vec<f64> = member_indices
        .iter()
        .map(|&i| samples[i].entropy.unwrap_or(0.0).max(0.0))
        .collect();
    let entropy_sum: f64 = entropies.iter().sum();
    let contribution_scores: Vec<f64> = if entropy_sum > 0.0 {
        entropies.iter().map(|e| e / entropy_sum).collect()
    } else {
        vec![1.0 / member_indices.len() as f64; member_indices.len()]
    };

    QuasiIdentifierGroup {
        group_id: format!("qi-group-{group_index}"),
        members: member_indices.iter().map(|&i| columns[i].column_ref.clone()).collect(),
        clustering_method: ClusteringMethod::CorrelationGraph,
        distinct_combinations: scores.distinct_combinations,
        singleton_combinations: scores.singleton_combinations,
        re_identification_risk: scores.re_identification_risk,
        k_anonymity_estimate: scores.k_anonymity_estimate,
        contribution_scores,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pii_protocol::{ColumnId, ColumnRef, TableId};

    fn column(name: &str, type_category: TypeCategory) -> ColumnDescriptor {
        ColumnDescriptor {
            id: ColumnId(0),
            table_id: TableId(0),
            column_ref: ColumnRef::new("public", "users", name),
            type_category,
            native_type: "text".into(),
            nullable: true,
            primary_key: false,
            size: None,
            scale: None,
            comment: None,
            is_foreign_key: false,
        }
    }

    fn sample(name: &str, values: &[&str]) -> SampleData {
        SampleData {
            column_ref: ColumnRef::new("public", "users", name),
            samples: values.iter().map(|v| Some(v.to_string())).collect(),
            total_row_count: values.len() as u64,
            null_count: 0,
            entropy: None,
            error: None,
        }
    }

    #[test]
    fn correlated_columns_form_a_group() {
        let columns = vec![
            column("zip", TypeCategory::String),
            column("state", TypeCategory::String),
            column("signup_source", TypeCategory::String),
        ];
        let samples = vec![
            sample("zip", &["11111", "22222", "33333", "44444", "11111", "22222"]),
            sample("state", &["NY", "CA", "TX", "WA", "NY", "CA"]),
            sample("signup_source", &["web", "app", "web", "app", "app", "web"]),
        ];

        let config = QiConfig { min_correlation_coefficient: 0.5, min_distinct_count: 2, ..QiConfig::default() };
        let analyzer = QuasiIdentifierAnalyzer::new();
        let groups = analyzer.analyze(&columns, &samples, &config);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members.len(), 2);
    }

    #[test]
    fn disabled_config_produces_no_groups() {
        let columns = vec![column("a", TypeCategory::String), column("b", TypeCategory::String)];
        let samples = vec![sample("a", &["x", "y"]), sample("b", &["x", "y"])];
        let config = QiConfig { enabled: false, ..QiConfig::default() };
        let analyzer = QuasiIdentifierAnalyzer::new();
        assert!(analyzer.analyze(&columns, &samples, &config).is_empty());
    }

    #[test]
    fn high_cardinality_columns_are_ineligible() {
        let columns = vec![column("id", TypeCategory::Numeric), column("other", TypeCategory::Numeric)];
        let unique: Vec<String> = (0..100).map(|i| i.to_string()).collect();
        let values: Vec<&str> = unique.iter().map(String::as_str).collect();
        let samples = vec![sample("id", &values), sample("other", &values)];
        let config = QiConfig { max_distinct_ratio: 0.5, ..QiConfig::default() };
        let analyzer = QuasiIdentifierAnalyzer::new();
        assert!(analyzer.analyze(&columns, &samples, &config).is_empty());
    }
}

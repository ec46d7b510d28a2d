//! Pairwise correlation measures between two sampled columns.
//!
//! Three measures cover the three type-category pairings a quasi-identifier
//! pair can fall into: Cramér's V for categorical-categorical, Pearson's r
//! for numeric-numeric, and the correlation ratio (eta) for a numeric
//! column against a categorical one.

use pii_protocol::TypeCategory;
use std::collections::HashMap;

/// Correlation strength in `[0, 1]` between two columns' sampled values,
/// aligned positionally (`a[i]` and `b[i]` are treated as the same row).
/// Positions with a null on either side are dropped from the comparison.
pub fn correlate(
    a_values: &[Option<String>],
    a_type: TypeCategory,
    b_values: &[Option<String>],
    b_type: TypeCategory,
) -> Option<f64> {
    let pairs: Vec<(&str, &str)> = a_values
        .iter()
        .zip(b_values.iter())
        .filter_map(|(a, b)| Some((a.as_deref()?, b.as_deref()?)))
        .collect();

    if pairs.len() < 2 {
        return None;
    }

    match (is_numeric(a_type), is_numeric(b_type)) {
        (true, true) => pearson(&pairs),
        (false, false) => cramers_v(&pairs),
        (true, false) => correlation_ratio(&pairs, true),
        (false, true) => correlation_ratio(&pairs, false),
    }
}

fn is_numeric(t: TypeCategory) -> bool {
    matches!(t, TypeCategory::Numeric)
}

fn parse_f64(v: &str) -> Option<f64> {
    v.trim().parse::<f64>().ok()
}

/// Pearson product-moment correlation coefficient, magnitude only (the sign
/// carries no meaning for re-identification risk, only strength does).
fn pearson(pairs: &[(&str, &str)]) -> Option<f64> {
    let points: Vec<(f64, f64)> = pairs.iter().filter_map(|(a, b)| Some((parse_f64(a)?, parse_f64(b)?))).collect();
    if points.len() < 2 {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &points {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return Some(0.0);
    }

    Some((cov / (var_x.sqrt() * var_y.sqrt())).abs())
}

/// Cramér's V over a contingency table built from the two categorical value
/// sequences.
fn cramers_v(pairs: &[(&str, &str)]) -> Option<f64> {
    let mut a_index: HashMap<&str, usize> = HashMap::new();
    let mut b_index: HashMap<&str, usize> = HashMap::new();
    for (a, b) in pairs {
        let next_a = a_index.len();
        a_index.entry(*a).or_insert(next_a);
        let next_b = b_index.len();
        b_index.entry(*b).or_insert(next_b);
    }

    let rows = a_index.len();
    let cols = b_index.len();
    if rows < 2 || cols < 2 {
        return Some(0.0);
    }

    let mut table = vec![0u64; rows * cols];
    for (a, b) in pairs {
        let r = a_index[a];
        let c = b_index[b];
        table[r * cols + c] += 1;
    }

    let n = pairs.len() as f64;
    let row_totals: Vec<u64> = (0..rows).map(|r| (0..cols).map(|c| table[r * cols + c]).sum()).collect();
    let col_totals: Vec<u64> = (0..cols).map(|c| (0..rows).map(|r| table[r * cols + c]).sum()).collect();

    let mut chi_sq = 0.0;
    for r in 0..rows {
        for c in 0..cols {
            let expected = (row_totals[r] as f64 * col_totals[c] as f64) / n;
            if expected > 0.0 {
                let observed = table[r * cols + c] as f64;
                chi_sq += (observed - expected).powi(2) / expected;
            }
        }
    }

    let k = rows.min(cols) as f64;
    if k <= 1.0 {
        return Some(0.0);
    }

    Some((chi_sq / (n * (k - 1.0))).sqrt().min(1.0))
}

/// Correlation ratio (eta) between a numeric column and a categorical
/// column: the share of the numeric column's variance explained by
/// category membership. `numeric_is_a` picks which side of `pairs` holds
/// the numeric values.
fn correlation_ratio(pairs: &[(&str, &str)], numeric_is_a: bool) -> Option<f64> {
    let mut groups: HashMap<&str, Vec<f64>> = HashMap::new();
    for (a, b) in pairs {
        let (category, numeric_str) = if numeric_is_a { (*b, *a) } else { (*a, *b) };
        if let Some(value) = parse_f64(numeric_str) {
            groups.entry(category).or_default().push(value);
        }
    }

    let all_values: Vec<f64> = groups.values().flatten().copied().collect();
    if all_values.len() < 2 || groups.len() < 2 {
        return Some(0.0);
    }

    let grand_mean = all_values.iter().sum::<f64>() / all_values.len() as f64;
    let total_variance: f64 = all_values.iter().map(|v| (v - grand_mean).powi(2)).sum();
    if total_variance == 0.0 {
        return Some(0.0);
    }

    let between_group_variance: f64 = groups
        .values()
        .map(|values| {
            let group_mean = values.iter().sum::<f64>() / values.len() as f64;
            values.len() as f64 * (group_mean - grand_mean).powi(2)
        })
        .sum();

    Some((between_group_variance / total_variance).sqrt().min(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(v: &[&str]) -> Vec<Option<String>> {
        v.iter().map(|s| Some(s.to_string())).collect()
    }

    #[test]
    fn perfectly_correlated_numeric_columns_score_near_one() {
        let a = values(&["1", "2", "3", "4", "5"]);
        let b = values(&["2", "4", "6", "8", "10"]);
        let score = correlate(&a, TypeCategory::Numeric, &b, TypeCategory::Numeric).unwrap();
        assert!(score > 0.99);
    }

    #[test]
    fn unrelated_numeric_columns_score_low() {
        let a = values(&["1", "2", "3", "4", "5"]);
        let b = values(&["5", "1", "4", "2", "3"]);
        let score = correlate(&a, TypeCategory::Numeric, &b, TypeCategory::Numeric).unwrap();
        assert!(score < 0.5);
    }

    #[test]
    fn identical_categorical_columns_score_near_one() {
        let a = values(&["x", "y", "x", "y", "z", "z"]);
        let b = values(&["x", "y", "x", "y", "z", "z"]);
        let score = correlate(&a, TypeCategory::String, &b, TypeCategory::String).unwrap();
        assert!(score > 0.9);
    }

    #[test]
    fn nulls_are_excluded_from_comparison() {
        let a = vec![Some("1".to_string()), None, Some("3".to_string())];
        let b = vec![Some("2".to_string()), Some("9".to_string()), Some("6".to_string())];
        // only 2 valid pairs remain: (1,2) and (3,6) — perfectly correlated
        let score = correlate(&a, TypeCategory::Numeric, &b, TypeCategory::Numeric).unwrap();
        assert!(score > 0.99);
    }
}

//! Re-identification risk scoring for a candidate quasi-identifier group.

use std::collections::HashMap;

/// Risk metrics computed from a group's joint value tuples.
pub struct RiskScores {
    pub distinct_combinations: u64,
    pub singleton_combinations: u64,
    pub re_identification_risk: f64,
    pub k_anonymity_estimate: f64,
}

/// Scores a group from its members' positionally-aligned sampled values.
/// `members` is a slice of per-column sample vectors, all the same length;
/// rows with a null in any member column are excluded from the tuple count,
/// since a partial tuple can't be compared for uniqueness.
pub fn score_group(members: &[&[Option<String>]]) -> RiskScores {
    let row_count = members.iter().map(|m| m.len()).min().unwrap_or(0);

    let mut tuple_counts: HashMap<Vec<&str>, u64> = HashMap::new();
    let mut total_rows = 0u64;

    for row in 0..row_count {
        let mut tuple = Vec::with_capacity(members.len());
        let mut complete = true;
        for column in members {
            match column[row].as_deref() {
                Some(v) => tuple.push(v),
                None => {
                    complete = false;
                    break;
                }
            }
        }
        if !complete {
            continue;
        }
        total_rows += 1;
        *tuple_counts.entry(tuple).or_insert(0) += 1;
    }

    if total_rows == 0 {
        return RiskScores {
            distinct_combinations: 0,
            singleton_combinations: 0,
            re_identification_risk: 0.0,
            k_anonymity_estimate: 0.0,
        };
    }

    let distinct_combinations = tuple_counts.len() as u64;
    let singleton_combinations = tuple_counts.values().filter(|&&c| c == 1).count() as u64;
    let re_identification_risk = (singleton_combinations as f64 / distinct_combinations.max(1) as f64).clamp(0.0, 1.0);
    let k_anonymity_estimate = distinct_combinations as f64 / singleton_combinations.max(1) as f64;

    RiskScores {
        distinct_combinations,
        singleton_combinations,
        re_identification_risk,
        k_anonymity_estimate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    #[test]
    fn all_unique_tuples_score_maximal_risk() {
        let zip = col(&["11111", "22222", "33333"]);
        let gender = col(&["M", "F", "M"]);
        let scores = score_group(&[&zip, &gender]);
        assert_eq!(scores.distinct_combinations, 3);
        assert_eq!(scores.singleton_combinations, 3);
        assert_eq!(scores.re_identification_risk, 1.0);
    }

    #[test]
    fn repeated_tuples_lower_risk() {
        let zip = col(&["11111", "11111", "11111"]);
        let gender = col(&["M", "M", "M"]);
        let scores = score_group(&[&zip, &gender]);
        assert_eq!(scores.distinct_combinations, 1);
        assert_eq!(scores.singleton_combinations, 0);
        assert_eq!(scores.re_identification_risk, 0.0);
        assert_eq!(scores.k_anonymity_estimate, 1.0);
    }

    #[test]
    fn rows_with_a_null_member_are_excluded() {
        let a = vec![Some("1".to_string()), None, Some("3".to_string())];
        let b = vec![Some("x".to_string()), Some("y".to_string()), Some("z".to_string())];
        let scores = score_group(&[&a, &b]);
        assert_eq!(scores.distinct_combinations, 2);
    }
}

//! `ReportBuilder`: pure assembly of a `ComplianceReport` from a finished
//! scan's detection results and QI groups. No I/O, no clock reads beyond
//! the timestamps the caller supplies — identical inputs always produce a
//! byte-identical report.

use chrono::{DateTime, Utc};
use pii_protocol::{
    ColumnRef, ComplianceReport, DetectionResult, PiiFinding, QuasiIdentifierGroup, ReportCounts,
    ScanConfig, SchemaSnapshot,
};
use std::collections::HashMap;

pub struct ReportBuilder;

impl ReportBuilder {
    pub fn new() -> Self {
        Self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn build(
        &self,
        scan_id: String,
        db_product_name: String,
        db_product_version: String,
        schema: &SchemaSnapshot,
        detection_results: &HashMap<ColumnRef, DetectionResult>,
        mut qi_groups: Vec<QuasiIdentifierGroup>,
        config_snapshot: ScanConfig,
        scan_started_at: DateTime<Utc>,
        scan_ended_at: DateTime<Utc>,
    ) -> ComplianceReport {
        let reporting_threshold = config_snapshot.detection.reporting_threshold;

        let mut findings: Vec<PiiFinding> = detection_results
            .values()
            .filter(|r| r.is_pii)
            .flat_map(|r| {
                r.reported_candidates(reporting_threshold).into_iter().map(|c| PiiFinding {
                    column_ref: r.column_ref.clone(),
                    pii_type: c.pii_type,
                    confidence: c.confidence,
                    strategy_id: c.strategy_id,
                    evidence: c.evidence.clone(),
                })
            })
            .collect();

        findings.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.pii_type.cmp(&b.pii_type))
                .then_with(|| a.column_ref.fully_qualified_name().cmp(&b.column_ref.fully_qualified_name()))
        });

        qi_groups.sort_by(|a, b| {
            b.re_identification_risk
                .partial_cmp(&a.re_identification_risk)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let pii_columns = detection_results.values().filter(|r| r.is_pii).count() as u64;
        let qi_columns: u64 = qi_groups.iter().map(|g| g.members.len() as u64).sum();

        ComplianceReport {
            scan_id,
            db_product_name,
            db_product_version,
            catalog: schema.catalog.clone(),
            schema: schema.schema.clone(),
            counts: ReportCounts {
                tables: schema.tables.len() as u64,
                columns: schema.column_count() as u64,
                pii_columns,
                qi_columns,
            },
            scan_started_at,
            scan_ended_at,
            config_snapshot,
            findings,
            qi_groups,
        }
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pii_protocol::{ClusteringMethod, PiiCandidate, PiiType, StrategyId};

    fn schema() -> SchemaSnapshot {
        let mut s = SchemaSnapshot::new("db", "public");
        s.tables.push(pii_protocol::TableDescriptor {
            id: pii_protocol::TableId(0),
            schema: "public".into(),
            name: "users".into(),
            kind: pii_protocol::TableKind::Table,
            columns: Vec::new(),
            outbound: Vec::new(),
            inbound: Vec::new(),
        });
        s
    }

    fn detection(column: &str, pii_type: PiiType, confidence: f64) -> (ColumnRef, DetectionResult) {
        let column_ref = ColumnRef::new("public", "users", column);
        let mut result = DetectionResult::empty(column_ref.clone());
        result.candidates.push(PiiCandidate::new(pii_type, confidence, StrategyId::Heuristic, "test"));
        result.is_pii = true;
        (column_ref, result)
    }

    #[test]
    fn findings_sort_by_descending_confidence_then_type_then_name() {
        let mut results = HashMap::new();
        let (c1, r1) = detection("email", PiiType::Email, 0.9);
        let (c2, r2) = detection("ssn", PiiType::Ssn, 0.95);
        results.insert(c1, r1);
        results.insert(c2, r2);

        let builder = ReportBuilder::new();
        let report = builder.build(
            "scan-1".into(),
            "PostgreSQL".into(),
            "16.0".into(),
            &schema(),
            &results,
            Vec::new(),
            ScanConfig::default(),
            Utc::now(),
            Utc::now(),
        );

        assert_eq!(report.findings.len(), 2);
        assert_eq!(report.findings[0].pii_type, PiiType::Ssn);
        assert_eq!(report.findings[1].pii_type, PiiType::Email);
    }

    #[test]
    fn below_threshold_candidates_are_excluded_from_non_pii_columns() {
        let mut results = HashMap::new();
        let column_ref = ColumnRef::new("public", "users", "nickname");
        let mut result = DetectionResult::empty(column_ref.clone());
        result.candidates.push(PiiCandidate::new(PiiType::Name, 0.3, StrategyId::Heuristic, "weak"));
        result.is_pii = false;
        results.insert(column_ref, result);

        let builder = ReportBuilder::new();
        let report = builder.build(
            "scan-2".into(),
            "PostgreSQL".into(),
            "16.0".into(),
            &schema(),
            &results,
            Vec::new(),
            ScanConfig::default(),
            Utc::now(),
            Utc::now(),
        );

        assert!(report.findings.is_empty());
        assert_eq!(report.counts.pii_columns, 0);
    }

    #[test]
    fn qi_groups_sort_by_descending_risk() {
        let low = QuasiIdentifierGroup {
            group_id: "g1".into(),
            members: vec![ColumnRef::new("public", "users", "zip")],
            clustering_method: ClusteringMethod::CorrelationGraph,
            distinct_combinations: 5,
            singleton_combinations: 1,
            re_identification_risk: 0.2,
            k_anonymity_estimate: 5.0,
            contribution_scores: vec![1.0],
        };
        let high = QuasiIdentifierGroup { re_identification_risk: 0.8, ..low.clone() };

        let builder = ReportBuilder::new();
        let report = builder.build(
            "scan-3".into(),
            "PostgreSQL".into(),
            "16.0".into(),
            &schema(),
            &HashMap::new(),
            vec![low, high],
            ScanConfig::default(),
            Utc::now(),
            Utc::now(),
        );

        assert_eq!(report.qi_groups[0].re_identification_risk, 0.8);
    }
}

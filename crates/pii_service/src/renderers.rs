//! Reference `ReportRenderer` implementations: `json`, `csv`, `text`. The
//! spec names these three formats explicitly (§6); a real deployment would
//! add `pdf`/`html`/`excel` behind the same port without touching
//! `pii_core`.

use pii_core::{RenderError, ReportRenderer};
use pii_protocol::ComplianceReport;

pub struct JsonRenderer;

impl ReportRenderer for JsonRenderer {
    fn format(&self) -> &'static str {
        "json"
    }

    fn render(&self, report: &ComplianceReport) -> Result<Vec<u8>, RenderError> {
        serde_json::to_vec_pretty(report).map_err(|e| RenderError(e.to_string()))
    }
}

/// One row per PII finding. Quasi-identifier groups don't fit the same
/// tabular shape, so they're rendered as a trailing summary section rather
/// than forced into extra columns.
pub struct CsvRenderer;

impl ReportRenderer for CsvRenderer {
    fn format(&self) -> &'static str {
        "csv"
    }

    fn render(&self, report: &ComplianceReport) -> Result<Vec<u8>, RenderError> {
        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());

        writer
            .write_record(["column", "pii_type", "confidence", "strategy", "evidence"])
            .map_err(|e| RenderError(e.to_string()))?;

        for finding in &report.findings {
            writer
                .write_record([
                    finding.column_ref.fully_qualified_name(),
                    finding.pii_type.to_string(),
                    format!("{:.4}", finding.confidence),
                    finding.strategy_id.to_string(),
                    finding.evidence.clone(),
                ])
                .map_err(|e| RenderError(e.to_string()))?;
        }

        writer.flush().map_err(|e| RenderError(e.to_string()))?;
        let mut bytes = writer.into_inner().map_err(|e| RenderError(e.to_string()))?;

        bytes.extend_from_slice(b"\n# quasi-identifier groups\n");
        bytes.extend_from_slice(b"group_id,members,distinct_combinations,singleton_combinations,re_identification_risk,k_anonymity_estimate\n");
        for group in &report.qi_groups {
            let members = group.members.iter().map(|m| m.fully_qualified_name()).collect::<Vec<_>>().join("|");
            bytes.extend_from_slice(
                format!(
                    "{},{},{},{},{:.4},{:.2}\n",
                    group.group_id,
                    members,
                    group.distinct_combinations,
                    group.singleton_combinations,
                    group.re_identification_risk,
                    group.k_anonymity_estimate,
                )
                .as_bytes(),
            );
        }

        Ok(bytes)
    }
}

pub struct TextRenderer;

impl ReportRenderer for TextRenderer {
    fn format(&self) -> &'static str {
        "text"
    }

    fn render(&self, report: &ComplianceReport) -> Result<Vec<u8>, RenderError> {
        use std::fmt::Write as _;

        let mut out = String::new();
        let _ = writeln!(out, "PII Compliance Report — scan {}", report.scan_id);
        let _ = writeln!(out, "Database: {} {}", report.db_product_name, report.db_product_version);
        let _ = writeln!(out, "Schema: {}.{}", report.catalog, report.schema);
        let _ = writeln!(
            out,
            "Scanned {} -> {}",
            report.scan_started_at.to_rfc3339(),
            report.scan_ended_at.to_rfc3339()
        );
        let _ = writeln!(
            out,
            "Tables: {}  Columns: {}  PII columns: {}  QI columns: {}",
            report.counts.tables, report.counts.columns, report.counts.pii_columns, report.counts.qi_columns
        );
        let _ = writeln!(out);

        let _ = writeln!(out, "PII findings ({}):", report.findings.len());
        for finding in &report.findings {
            let _ = writeln!(
                out,
                "  {:<7.4}  {:<12}  {}  [{}]",
                finding.confidence,
                finding.pii_type.to_string(),
                finding.column_ref.fully_qualified_name(),
                finding.strategy_id,
            );
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "Quasi-identifier groups ({}):", report.qi_groups.len());
        for group in &report.qi_groups {
            let members = group.members.iter().map(|m| m.fully_qualified_name()).collect::<Vec<_>>().join(", ");
            let _ = writeln!(
                out,
                "  {}  risk={:.4}  k~{:.1}  members=[{}]",
                group.group_id, group.re_identification_risk, group.k_anonymity_estimate, members
            );
        }

        Ok(out.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pii_protocol::{ComplianceReport, ReportCounts, ScanConfig};

    fn empty_report() -> ComplianceReport {
        let now = chrono::Utc::now();
        ComplianceReport {
            scan_id: "job-1".to_string(),
            db_product_name: "PostgreSQL".to_string(),
            db_product_version: "16.2".to_string(),
            catalog: "mydb".to_string(),
            schema: "public".to_string(),
            counts: ReportCounts { tables: 0, columns: 0, pii_columns: 0, qi_columns: 0 },
            scan_started_at: now,
            scan_ended_at: now,
            config_snapshot: ScanConfig::default(),
            findings: Vec::new(),
            qi_groups: Vec::new(),
        }
    }

    #[test]
    fn json_renderer_round_trips() {
        let report = empty_report();
        let bytes = JsonRenderer.render(&report).unwrap();
        let parsed: ComplianceReport = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.scan_id, report.scan_id);
    }

    #[test]
    fn csv_renderer_emits_header_row() {
        let report = empty_report();
        let bytes = CsvRenderer.render(&report).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("column,pii_type,confidence,strategy,evidence"));
    }

    #[test]
    fn text_renderer_includes_scan_id() {
        let report = empty_report();
        let bytes = TextRenderer.render(&report).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("job-1"));
    }
}

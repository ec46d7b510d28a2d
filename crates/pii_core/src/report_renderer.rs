//! `ReportRenderer`: port for turning a finished `ComplianceReport` into
//! bytes in some output format. Concrete formats (JSON, CSV, plain text)
//! are implemented in `pii_service`, which owns the CLI/output surface;
//! this crate only defines the seam.

use async_trait::async_trait;
use pii_protocol::ComplianceReport;

#[async_trait]
pub trait ReportRenderer: Send + Sync {
    /// The format name this renderer answers to, e.g. `"json"`.
    fn format(&self) -> &'static str;

    fn render(&self, report: &ComplianceReport) -> Result<Vec<u8>, RenderError>;
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct RenderError(pub String);

/// Dispatches to whichever registered renderer answers to `format`.
pub struct RendererRegistry {
    renderers: Vec<Box<dyn ReportRenderer>>,
}

impl RendererRegistry {
    pub fn new(renderers: Vec<Box<dyn ReportRenderer>>) -> Self {
        Self { renderers }
    }

    pub fn render(&self, report: &ComplianceReport, format: &str) -> Result<Vec<u8>, RenderError> {
        self.renderers
            .iter()
            .find(|r| r.format().eq_ignore_ascii_case(format))
            .ok_or_else(|| RenderError(format!("unsupported report format: {format}")))?
            .render(report)
    }
}

//! Scan orchestration: the job lifecycle, the four-phase state machine,
//! progress publication, and final report assembly.
//!
//! This is the one crate in the workspace that wires `pii_db`,
//! `pii_detect`, and `pii_qi` together behind a single `ScanOrchestrator`.
//! Everything downstream (a CLI, an RPC service) only ever talks to this
//! crate's public surface plus `pii_protocol`'s wire types.

pub mod cancellation;
pub mod error;
pub mod job_store;
pub mod metrics;
pub mod ner_factory;
pub mod orchestrator;
pub mod progress;
pub mod report_builder;
pub mod report_renderer;

pub use cancellation::CancellationToken;
pub use error::{Result, ScanError};
pub use job_store::JobStore;
pub use metrics::{Metrics, MetricsSnapshot, METRICS};
pub use ner_factory::{HttpNerClientFactory, NerClientFactory};
pub use orchestrator::ScanOrchestrator;
pub use progress::{JobProgress, ProgressBus};
pub use report_builder::ReportBuilder;
pub use report_renderer::{RendererRegistry, RenderError, ReportRenderer};

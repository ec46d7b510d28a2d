//! PII detection strategies and the pipeline that composes them.
//!
//! Three independent strategies — naming-convention heuristics, value-level
//! regex matching, and external NER — each implement `DetectionStrategy`.
//! `PiiPipeline` runs them in priority order over one column's sample and
//! folds their candidates into a single `DetectionResult`.

pub mod circuit_breaker;
pub mod error;
pub mod heuristic;
pub mod ner;
pub mod pipeline;
pub mod regex_catalog;
pub mod regex_strategy;
pub mod strategy;

pub use circuit_breaker::CircuitBreaker;
pub use error::{DetectError, Result};
pub use heuristic::HeuristicStrategy;
pub use ner::{HttpNerClient, NerClient, NerEntity, NerStrategy};
pub use pipeline::PiiPipeline;
pub use regex_strategy::RegexStrategy;
pub use strategy::DetectionStrategy;

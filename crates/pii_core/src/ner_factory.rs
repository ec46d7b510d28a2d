//! `NerClientFactory`: builds a fresh `NerClient` per job from that job's
//! effective `NerConfig`, so each scan can point at a different NER
//! endpoint without the orchestrator hard-coding `HttpNerClient`.
//!
//! The circuit breaker guarding NER calls is owned here rather than by the
//! pipeline: the breaker is process-wide, so every job's `NerStrategy`
//! shares the one instance this factory was constructed with. A string of
//! NER failures in one scan keeps the next scan's NER strategy tripped
//! until the reset timeout elapses, instead of resetting at each new job.

use pii_detect::{CircuitBreaker, HttpNerClient, NerClient};
use pii_protocol::NerConfig;
use std::sync::Arc;

pub trait NerClientFactory: Send + Sync {
    fn build(&self, config: &NerConfig) -> Box<dyn NerClient>;

    /// The process-wide circuit breaker every `NerStrategy` built from this
    /// factory shares.
    fn breaker(&self) -> Arc<CircuitBreaker>;
}

/// Builds a real `HttpNerClient` against the config's `url`. The default
/// used by `ScanOrchestrator` unless a test substitutes a fake factory.
pub struct HttpNerClientFactory {
    breaker: Arc<CircuitBreaker>,
}

impl HttpNerClientFactory {
    /// `config` seeds the shared breaker's threshold/reset-timeout; later
    /// jobs' `NerConfig.circuit_breaker` overrides are ignored for the
    /// breaker itself since it is a single process-wide instance, not
    /// reconfigured per job.
    pub fn new(config: &NerConfig) -> Self {
        Self { breaker: Arc::new(CircuitBreaker::new(&config.circuit_breaker)) }
    }
}

impl NerClientFactory for HttpNerClientFactory {
    fn build(&self, config: &NerConfig) -> Box<dyn NerClient> {
        Box::new(HttpNerClient::new(config.url.clone()))
    }

    fn breaker(&self) -> Arc<CircuitBreaker> {
        self.breaker.clone()
    }
}

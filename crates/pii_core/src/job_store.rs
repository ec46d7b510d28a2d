//! `JobStore`: port for persisting `Job` snapshots beyond the in-memory
//! `ScanOrchestrator` registry.
//!
//! The orchestrator always keeps the authoritative live `Job` in its own
//! registry; a `JobStore`, when configured, is written to on every phase
//! transition so a restart (or a second process) can recover job history.
//! No implementation ships in this crate — `pii_service` provides one, the
//! same way `pii_db::ConnectionProvider` is a port defined here and
//! implemented one layer down... except here it's the other way around:
//! this port is implemented *above* the core, in the service binary.

use async_trait::async_trait;
use pii_protocol::{Job, JobId};

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn put(&self, job: Job);
    async fn get(&self, job_id: JobId) -> Option<Job>;
    async fn list(&self) -> Vec<Job>;
    async fn delete(&self, job_id: JobId);
}

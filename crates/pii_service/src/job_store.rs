//! `InMemoryJobStore`: the reference `pii_core::JobStore` this binary wires
//! up by default. Durability across restarts is a Non-goal the spec leaves
//! optional (§6) — this implementation exists so the orchestrator always
//! has somewhere to write transitions through to, without requiring a real
//! database for job history.

use async_trait::async_trait;
use pii_core::JobStore;
use pii_protocol::{Job, JobId};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn put(&self, job: Job) {
        self.jobs.write().await.insert(job.id, job);
    }

    async fn get(&self, job_id: JobId) -> Option<Job> {
        self.jobs.read().await.get(&job_id).cloned()
    }

    async fn list(&self) -> Vec<Job> {
        self.jobs.read().await.values().cloned().collect()
    }

    async fn delete(&self, job_id: JobId) {
        self.jobs.write().await.remove(&job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pii_protocol::{ConnectionId, ScanRequest};

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryJobStore::new();
        let job = Job::new(JobId::new(), ScanRequest::new(ConnectionId::new("demo")));
        let id = job.id;
        store.put(job).await;
        assert!(store.get(id).await.is_some());
    }

    #[tokio::test]
    async fn delete_removes_job() {
        let store = InMemoryJobStore::new();
        let job = Job::new(JobId::new(), ScanRequest::new(ConnectionId::new("demo")));
        let id = job.id;
        store.put(job).await;
        store.delete(id).await;
        assert!(store.get(id).await.is_none());
    }
}

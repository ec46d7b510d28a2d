//! `ParallelSampler`: fans `ColumnSampler` out across every column of one
//! table with bounded concurrency, the way `casparian_worker`'s type
//! inference pool bounds its own per-file worker count.
//!
//! This crate knows nothing about `pii_core`'s `ProgressBus` or
//! `CancellationToken` types — the caller hands in plain closures so the
//! dependency only ever points one way (`pii_core` -> `pii_db`).

use crate::connection::ScopedConnection;
use crate::error::Result;
use crate::sampler::ColumnSampler;
use pii_protocol::{ColumnDescriptor, ColumnRef, SampleData, SamplingMethod};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// One progress notification from a `sample_all` run.
#[derive(Debug, Clone)]
pub enum SamplerEvent {
    Started(ColumnRef),
    Completed(ColumnRef),
    Progress { processed: u64, total: u64 },
}

/// Stateless: `ColumnSampler` carries no state of its own, so this type
/// exists only to give the fan-out loop a name.
pub struct ParallelSampler;

impl ParallelSampler {
    pub fn new() -> Self {
        Self
    }

    /// Samples every column in `columns`, at most `max_concurrency` at a
    /// time. `should_cancel` is polled before each new dispatch — once it
    /// returns `true`, no further columns are dispatched, but columns
    /// already in flight are allowed to finish. Returns an error only if
    /// every dispatched column failed to sample; individual failures are
    /// otherwise recorded on that column's `SampleData.error` and do not
    /// abort the rest.
    #[allow(clippy::too_many_arguments)]
    pub async fn sample_all(
        &self,
        conn: &ScopedConnection,
        columns: &[ColumnDescriptor],
        sample_size: u32,
        method: SamplingMethod,
        entropy_enabled: bool,
        max_concurrency: usize,
        should_cancel: Arc<dyn Fn() -> bool + Send + Sync>,
        on_event: Arc<dyn Fn(SamplerEvent) + Send + Sync>,
    ) -> Result<HashMap<ColumnRef, SampleData>> {
        let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
        let total = columns.len() as u64;
        let mut set: JoinSet<(ColumnRef, SampleData)> = JoinSet::new();
        let mut dispatched = 0usize;

        for column in columns {
            if should_cancel() {
                break;
            }

            let permit = semaphore.clone().acquire_owned().await.expect("sampler semaphore closed");
            let conn = conn.clone();
            let column = column.clone();
            let column_ref = column.column_ref.clone();
            on_event(SamplerEvent::Started(column_ref));
            dispatched += 1;

            set.spawn(async move {
                let _permit = permit;
                let sampler = ColumnSampler::new();
                let data = sampler.sample(&conn, &column, sample_size, method, entropy_enabled).await;
                (column.column_ref.clone(), data)
            });
        }

        let mut results = HashMap::with_capacity(dispatched);
        let mut processed = 0u64;
        while let Some(outcome) = set.join_next().await {
            let (column_ref, data) = outcome.expect("column sampling task panicked");
            on_event(SamplerEvent::Completed(column_ref.clone()));
            processed += 1;
            on_event(SamplerEvent::Progress { processed, total });
            results.insert(column_ref, data);
        }

        if dispatched > 0 && results.values().all(|d| d.error.is_some()) {
            return Err(crate::error::DbError::sampling("every column failed to sample"));
        }

        Ok(results)
    }
}

impl Default for ParallelSampler {
    fn default() -> Self {
        Self::new()
    }
}

//! `ProgressBus`: fan-out of `ScanEvent`s from the one driver task that owns
//! a job to however many subscribers are watching it.
//!
//! Delivery is best-effort per subscriber: a full subscriber channel drops
//! the event for that subscriber only (never for others) and bumps a drop
//! counter. Each job gets its own monotonically increasing sequence number
//! so a subscriber can detect it missed something.

use pii_protocol::{JobId, ScanEvent, ScanEventKind};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::trace;

/// Per-subscriber channel capacity before events start dropping.
const SUBSCRIBER_BUFFER: usize = 256;

struct Subscriber {
    sender: mpsc::Sender<ScanEvent>,
    drops: AtomicU64,
}

#[derive(Default)]
struct JobChannel {
    sequence: AtomicU64,
    subscribers: Vec<Subscriber>,
}

/// Single publisher (the orchestrator's driver tasks), many subscribers.
/// Subscriptions are keyed by `JobId`; a subscriber registered via
/// `subscribe_all` additionally receives every job's events.
pub struct ProgressBus {
    by_job: RwLock<HashMap<JobId, JobChannel>>,
    firehose: RwLock<Vec<Subscriber>>,
    dropped_total: AtomicU64,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self { by_job: RwLock::new(HashMap::new()), firehose: RwLock::new(Vec::new()), dropped_total: AtomicU64::new(0) }
    }

    /// Subscribe to one job's events.
    pub async fn subscribe(&self, job_id: JobId) -> mpsc::Receiver<ScanEvent> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let mut by_job = self.by_job.write().await;
        by_job.entry(job_id).or_default().subscribers.push(Subscriber { sender: tx, drops: AtomicU64::new(0) });
        rx
    }

    /// Subscribe to every job's events, present and future.
    pub async fn subscribe_all(&self) -> mpsc::Receiver<ScanEvent> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.firehose.write().await.push(Subscriber { sender: tx, drops: AtomicU64::new(0) });
        rx
    }

    /// Publish one event kind for `job_id`, stamping it with that job's
    /// next sequence number.
    pub async fn publish(&self, job_id: JobId, kind: ScanEventKind) {
        let sequence = {
            let by_job = self.by_job.read().await;
            match by_job.get(&job_id) {
                Some(channel) => channel.sequence.fetch_add(1, Ordering::SeqCst),
                None => 0,
            }
        };

        let event = ScanEvent { job_id, sequence, kind };

        if let Some(channel) = self.by_job.read().await.get(&job_id) {
            for subscriber in &channel.subscribers {
                self.deliver(subscriber, event.clone());
            }
        }

        for subscriber in self.firehose.read().await.iter() {
            self.deliver(subscriber, event.clone());
        }
    }

    fn deliver(&self, subscriber: &Subscriber, event: ScanEvent) {
        if subscriber.sender.try_send(event).is_err() {
            subscriber.drops.fetch_add(1, Ordering::Relaxed);
            self.dropped_total.fetch_add(1, Ordering::Relaxed);
            trace!("progress bus subscriber buffer full, dropping event");
        }
    }

    /// Drops the per-job subscriber table once a job is terminal; the
    /// firehose subscription (if any) is unaffected.
    pub async fn retire(&self, job_id: JobId) {
        self.by_job.write().await.remove(&job_id);
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to publish progress for exactly one job, threaded through the
/// phase-execution helpers so they don't need the whole bus plus a job id.
#[derive(Clone)]
pub struct JobProgress {
    bus: Arc<ProgressBus>,
    job_id: JobId,
}

impl JobProgress {
    pub fn new(bus: Arc<ProgressBus>, job_id: JobId) -> Self {
        Self { bus, job_id }
    }

    pub async fn emit(&self, kind: ScanEventKind) {
        self.bus.publish(self.job_id, kind).await;
    }
}

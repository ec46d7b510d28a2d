//! `ScanOrchestrator`: the one stateful thing in this crate. Owns the job
//! registry, spawns one driver task per submitted job, and drives that job
//! through the four-phase state machine (`EXTRACTING_METADATA` ->
//! `SAMPLING` -> `DETECTING_PII` -> `GENERATING_REPORT`), publishing
//! progress as it goes and always releasing the acquired connection on the
//! way out, success or not.

use crate::cancellation::CancellationToken;
use crate::error::{Result, ScanError};
use crate::job_store::JobStore;
use crate::metrics::METRICS;
use crate::ner_factory::NerClientFactory;
use crate::progress::{JobProgress, ProgressBus};
use crate::report_builder::ReportBuilder;
use pii_db::{ConnectionProvider, MetadataExtractor, ParallelSampler, ScopedConnection};
use pii_detect::{DetectionStrategy, HeuristicStrategy, NerStrategy, PiiPipeline, RegexStrategy};
use pii_protocol::{
    ColumnDescriptor, ColumnRef, ComplianceReport, ConnectionId, DetectionResult, Job, JobId, Phase,
    QiConfig, QuasiIdentifierGroup, SampleData, SamplingMethod, ScanConfig, ScanEventKind, ScanRequest,
    SchemaSnapshot,
};
use pii_qi::QuasiIdentifierAnalyzer;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinSet;
use tracing::{error, info};

struct JobHandle {
    job: Arc<RwLock<Job>>,
    cancel: CancellationToken,
}

pub struct ScanOrchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    connection_provider: Arc<dyn ConnectionProvider>,
    ner_factory: Arc<dyn NerClientFactory>,
    job_store: Option<Arc<dyn JobStore>>,
    progress_bus: Arc<ProgressBus>,
    jobs: RwLock<HashMap<JobId, JobHandle>>,
    creation_order: Mutex<Vec<JobId>>,
    dispatch_tx: mpsc::UnboundedSender<JobId>,
}

impl ScanOrchestrator {
    pub fn new(connection_provider: Arc<dyn ConnectionProvider>, ner_factory: Arc<dyn NerClientFactory>) -> Self {
        Self::with_job_store(connection_provider, ner_factory, None)
    }

    /// Same as `new`, but writes every job transition through to `store` in
    /// addition to the in-memory registry this orchestrator always keeps.
    pub fn with_job_store(
        connection_provider: Arc<dyn ConnectionProvider>,
        ner_factory: Arc<dyn NerClientFactory>,
        job_store: Option<Arc<dyn JobStore>>,
    ) -> Self {
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(OrchestratorInner {
            connection_provider,
            ner_factory,
            job_store,
            progress_bus: Arc::new(ProgressBus::new()),
            jobs: RwLock::new(HashMap::new()),
            creation_order: Mutex::new(Vec::new()),
            dispatch_tx,
        });

        let dispatcher = inner.clone();
        tokio::spawn(async move {
            dispatcher.run_dispatcher(dispatch_rx).await;
        });

        Self { inner }
    }

    pub fn progress_bus(&self) -> Arc<ProgressBus> {
        self.inner.progress_bus.clone()
    }

    /// Registers a new job and enqueues it on the dispatcher's unbounded
    /// channel. Returns immediately with the assigned `JobId`; the job
    /// starts in `PENDING` and the dispatcher loop picks it up and spawns
    /// its driver task, keeping `submit` itself non-blocking regardless of
    /// how many drivers are currently running.
    pub async fn submit(&self, request: ScanRequest) -> Result<JobId> {
        if request.connection_id.0.is_empty() {
            return Err(ScanError::invalid_request("connection_id must not be empty"));
        }
        if !self.inner.connection_provider.is_valid(&request.connection_id).await {
            return Err(ScanError::invalid_request(format!("unknown connection id: {}", request.connection_id)));
        }
        merge_config(&request).validate().map_err(ScanError::invalid_request)?;

        let job_id = JobId::new();
        let job = Job::new(job_id, request);
        let handle = JobHandle { job: Arc::new(RwLock::new(job.clone())), cancel: CancellationToken::new() };

        {
            let mut jobs = self.inner.jobs.write().await;
            jobs.insert(job_id, handle);
        }
        self.inner.creation_order.lock().await.push(job_id);

        if let Some(store) = &self.inner.job_store {
            store.put(job).await;
        }

        METRICS.inc_jobs_submitted();

        self.inner
            .dispatch_tx
            .send(job_id)
            .map_err(|_| ScanError::invalid_request("orchestrator dispatcher has shut down"))?;

        Ok(job_id)
    }

    pub async fn status(&self, job_id: JobId) -> Result<Job> {
        let jobs = self.inner.jobs.read().await;
        let handle = jobs.get(&job_id).ok_or_else(|| ScanError::JobNotFound(job_id.to_string()))?;
        Ok(handle.job.read().await.clone())
    }

    pub async fn list(&self) -> Vec<Job> {
        let order = self.inner.creation_order.lock().await;
        let jobs = self.inner.jobs.read().await;
        let mut out = Vec::with_capacity(order.len());
        for id in order.iter() {
            if let Some(handle) = jobs.get(id) {
                out.push(handle.job.read().await.clone());
            }
        }
        out
    }

    /// Requests cancellation. The job's driver task observes this at its
    /// next safe point (phase boundary or per-column dispatch) and
    /// transitions to `FAILED` with a `Cancelled` error; already-dispatched
    /// work for the current column is allowed to finish.
    pub async fn cancel(&self, job_id: JobId) -> Result<()> {
        let jobs = self.inner.jobs.read().await;
        let handle = jobs.get(&job_id).ok_or_else(|| ScanError::JobNotFound(job_id.to_string()))?;
        handle.cancel.cancel();
        Ok(())
    }

    pub async fn report(&self, job_id: JobId) -> Result<ComplianceReport> {
        let job = self.status(job_id).await?;
        match job.report {
            Some(report) => Ok(report),
            None => Err(ScanError::JobNotReady(job_id.to_string(), job.phase.to_string())),
        }
    }

    pub async fn subscribe(&self, job_id: JobId) -> mpsc::Receiver<pii_protocol::ScanEvent> {
        self.inner.progress_bus.subscribe(job_id).await
    }

    pub async fn subscribe_all(&self) -> mpsc::Receiver<pii_protocol::ScanEvent> {
        self.inner.progress_bus.subscribe_all().await
    }
}

impl OrchestratorInner {
    /// The single dispatcher loop: pulls queued job ids off the unbounded
    /// channel `submit` writes to and spawns one driver task per job. This
    /// is the only place driver tasks are spawned from.
    async fn run_dispatcher(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<JobId>) {
        while let Some(job_id) = rx.recv().await {
            let inner = self.clone();
            tokio::spawn(async move {
                inner.run_job(job_id).await;
            });
        }
    }

    async fn run_job(self: Arc<Self>, job_id: JobId) {
        let (job_handle_arc, cancel) = {
            let jobs = self.jobs.read().await;
            let handle = jobs.get(&job_id).expect("driver spawned for a job not in the registry");
            (handle.job.clone(), handle.cancel.clone())
        };

        let connection_id = job_handle_arc.read().await.connection_id.clone();
        let request = job_handle_arc.read().await.request.clone();
        let config = merge_config(&request);
        let progress = JobProgress::new(self.progress_bus.clone(), job_id);

        match self.drive(job_id, &connection_id, &config, &cancel, &progress, &job_handle_arc).await {
            Ok(report) => {
                self.transition(&job_handle_arc, Phase::Completed, None, Some(report.clone())).await;
                progress
                    .emit(ScanEventKind::ScanCompleted {
                        tables: report.counts.tables,
                        columns: report.counts.columns,
                        pii_columns: report.counts.pii_columns,
                        qi_columns: report.counts.qi_columns,
                    })
                    .await;
                METRICS.inc_jobs_completed();
            }
            Err(ScanError::Kind(pii_protocol::ScanErrorKind::Cancelled)) => {
                self.transition(&job_handle_arc, Phase::Failed, Some("scan cancelled".into()), None).await;
                progress.emit(ScanEventKind::ScanFailed { reason: "scan cancelled".into() }).await;
                METRICS.inc_jobs_cancelled();
            }
            Err(e) => {
                let message = e.kind().message();
                error!(job_id = %job_id, error = %message, "scan job failed");
                self.transition(&job_handle_arc, Phase::Failed, Some(message.clone()), None).await;
                progress.emit(ScanEventKind::ScanFailed { reason: message }).await;
                METRICS.inc_jobs_failed();
            }
        }

        if let Some(store) = &self.job_store {
            store.put(job_handle_arc.read().await.clone()).await;
        }
        self.progress_bus.retire(job_id).await;
    }

    async fn drive(
        &self,
        job_id: JobId,
        connection_id: &ConnectionId,
        config: &ScanConfig,
        cancel: &CancellationToken,
        progress: &JobProgress,
        job: &Arc<RwLock<Job>>,
    ) -> Result<ComplianceReport> {
        check_cancelled(cancel)?;

        self.transition(job, Phase::ExtractingMetadata, None, None).await;
        progress.emit(ScanEventKind::PhaseChanged { phase: Phase::ExtractingMetadata, message: "acquiring connection".into() }).await;

        let conn = self.connection_provider.acquire(connection_id).await?;
        let result = self.drive_with_connection(job_id, &conn, config, cancel, progress, job).await;
        self.connection_provider.release(conn).await;
        result
    }

    async fn drive_with_connection(
        &self,
        job_id: JobId,
        conn: &ScopedConnection,
        config: &ScanConfig,
        cancel: &CancellationToken,
        progress: &JobProgress,
        job: &Arc<RwLock<Job>>,
    ) -> Result<ComplianceReport> {
        let request = job.read().await.request.clone();
        let scan_started_at = job.read().await.created_at;

        progress.emit(ScanEventKind::PhaseChanged { phase: Phase::ExtractingMetadata, message: "extracting schema".into() }).await;
        let schema = MetadataExtractor::new().extract(conn, &request.target_tables).await?;
        info!(job_id = %job_id, tables = schema.tables.len(), columns = schema.columns.len(), "schema extracted");
        check_cancelled(cancel)?;

        self.transition(job, Phase::Sampling, None, None).await;
        progress.emit(ScanEventKind::PhaseChanged { phase: Phase::Sampling, message: "sampling columns".into() }).await;
        let samples = self.sample_all_tables(&schema, conn, config, cancel, progress).await?;
        METRICS.add_columns_sampled(samples.len() as u64);
        check_cancelled(cancel)?;

        self.transition(job, Phase::DetectingPii, None, None).await;
        progress.emit(ScanEventKind::PhaseChanged { phase: Phase::DetectingPii, message: "running detection strategies".into() }).await;
        let mut detection_results = self.detect_all(&schema, &samples, config, cancel, progress).await?;

        let qi_groups = if config.qi.enabled {
            self.analyze_quasi_identifiers(&schema, &samples, &mut detection_results, &config.qi, progress).await
        } else {
            Vec::new()
        };
        METRICS.add_qi_groups_formed(qi_groups.len() as u64);
        check_cancelled(cancel)?;

        self.transition(job, Phase::GeneratingReport, None, None).await;
        progress.emit(ScanEventKind::PhaseChanged { phase: Phase::GeneratingReport, message: "assembling report".into() }).await;

        let db_product_version = conn.product_version().await;
        let db_product_name = conn.kind.product_name().to_string();

        let report = ReportBuilder::new().build(
            job_id.to_string(),
            db_product_name,
            db_product_version,
            &schema,
            &detection_results,
            qi_groups,
            config.clone(),
            scan_started_at,
            chrono::Utc::now(),
        );

        Ok(report)
    }

    async fn sample_all_tables(
        &self,
        schema: &SchemaSnapshot,
        conn: &ScopedConnection,
        config: &ScanConfig,
        cancel: &CancellationToken,
        progress: &JobProgress,
    ) -> Result<HashMap<ColumnRef, SampleData>> {
        let sampler = ParallelSampler::new();
        let mut all_samples = HashMap::with_capacity(schema.column_count());

        for table in &schema.tables {
            check_cancelled(cancel)?;

            let columns: Vec<ColumnDescriptor> = table.columns.iter().map(|id| schema.column(*id).clone()).collect();
            if columns.is_empty() {
                continue;
            }

            let should_cancel = cancel.as_predicate();

            // `ParallelSampler::sample_all` calls `on_event` synchronously,
            // in the exact order events occur (`Started` before that
            // column's `Completed`/`Progress`), but the callback itself
            // can't `.await`. Forward events over an unbounded channel —
            // `send` is synchronous and preserves that call order — and
            // drain it on a single task that awaits `progress.emit` one
            // event at a time, so published sequence numbers never race.
            let (event_tx, mut event_rx) = mpsc::unbounded_channel::<pii_db::SamplerEvent>();
            let drain_progress = progress.clone();
            let drain_handle = tokio::spawn(async move {
                while let Some(event) = event_rx.recv().await {
                    match event {
                        pii_db::SamplerEvent::Started(column) => drain_progress.emit(ScanEventKind::ColumnStarted { column }).await,
                        pii_db::SamplerEvent::Completed(column) => drain_progress.emit(ScanEventKind::ColumnCompleted { column }).await,
                        pii_db::SamplerEvent::Progress { processed, total } => {
                            drain_progress.emit(ScanEventKind::ProgressUpdated { processed, total }).await
                        }
                    }
                }
            });
            let on_event = Arc::new(move |event: pii_db::SamplerEvent| {
                let _ = event_tx.send(event);
            }) as Arc<dyn Fn(pii_db::SamplerEvent) + Send + Sync>;

            let result = sampler
                .sample_all(
                    conn,
                    &columns,
                    config.sampling.sample_size,
                    config.sampling.method,
                    config.sampling.entropy_enabled,
                    config.sampling.max_concurrent_db_queries,
                    should_cancel,
                    on_event,
                )
                .await;

            // `on_event` (and its captured sender) is dropped with
            // `sample_all`'s return, closing the channel so the drain task
            // finishes after flushing whatever is still queued.
            let _ = drain_handle.await;
            let table_samples = result?;

            all_samples.extend(table_samples);
        }

        Ok(all_samples)
    }

    async fn detect_all(
        &self,
        schema: &SchemaSnapshot,
        samples: &HashMap<ColumnRef, SampleData>,
        config: &ScanConfig,
        cancel: &CancellationToken,
        progress: &JobProgress,
    ) -> Result<HashMap<ColumnRef, DetectionResult>> {
        let pipeline = Arc::new(self.build_pipeline(&config.detection));
        let semaphore = Arc::new(tokio::sync::Semaphore::new(config.sampling.max_concurrent_db_queries.max(1)));
        let mut set: JoinSet<DetectionResult> = JoinSet::new();
        let total = schema.column_count() as u64;
        let mut dispatched = 0u64;

        for column in schema.all_columns() {
            if cancel.is_cancelled() {
                break;
            }
            let sample = samples
                .get(&column.column_ref)
                .cloned()
                .unwrap_or_else(|| SampleData::empty(column.column_ref.clone()));

            let permit = semaphore.clone().acquire_owned().await.expect("detection semaphore closed");
            let pipeline = pipeline.clone();
            let column = column.clone();
            progress.emit(ScanEventKind::ColumnStarted { column: column.column_ref.clone() }).await;
            dispatched += 1;

            set.spawn(async move {
                let _permit = permit;
                pipeline.run(&column, &sample).await
            });
        }

        let mut results = HashMap::with_capacity(dispatched as usize);
        let mut processed = 0u64;
        let mut pii_found = 0u64;
        while let Some(outcome) = set.join_next().await {
            let result = outcome.expect("detection task panicked");
            processed += 1;
            progress.emit(ScanEventKind::ColumnCompleted { column: result.column_ref.clone() }).await;
            progress.emit(ScanEventKind::ProgressUpdated { processed, total }).await;

            if !result.strategy_errors.is_empty() {
                for _ in &result.strategy_errors {
                    METRICS.inc_strategy_errors();
                }
            }

            if result.is_pii {
                pii_found += 1;
                if let Some(candidate) = result.highest_confidence() {
                    progress
                        .emit(ScanEventKind::PiiDetected {
                            column: result.column_ref.clone(),
                            pii_type: candidate.pii_type,
                            confidence: candidate.confidence,
                        })
                        .await;
                }
            }

            results.insert(result.column_ref.clone(), result);
        }

        METRICS.add_columns_detected_pii(pii_found);
        METRICS.set_ner_circuit_trips(self.ner_factory.breaker().trip_count());
        Ok(results)
    }

    fn build_pipeline(&self, config: &pii_protocol::DetectionConfig) -> PiiPipeline {
        let ner_client = self.ner_factory.build(&config.ner);
        let breaker = self.ner_factory.breaker();
        let strategies: Vec<Box<dyn DetectionStrategy>> = vec![
            Box::new(HeuristicStrategy::new(config.heuristic_threshold)),
            Box::new(RegexStrategy::new(config.regex_threshold)),
            Box::new(NerStrategy::new(ner_client, breaker, &config.ner, config.ner_threshold)),
        ];
        PiiPipeline::new(strategies, config)
    }

    /// Runs QI analysis per table (correlation is only meaningful within one
    /// table's rows) over non-PII columns, attaches each resulting group's
    /// membership to its member columns' `DetectionResult`s, and returns the
    /// flat list of groups for the report.
    async fn analyze_quasi_identifiers(
        &self,
        schema: &SchemaSnapshot,
        samples: &HashMap<ColumnRef, SampleData>,
        detection_results: &mut HashMap<ColumnRef, DetectionResult>,
        qi_config: &QiConfig,
        progress: &JobProgress,
    ) -> Vec<QuasiIdentifierGroup> {
        let analyzer = QuasiIdentifierAnalyzer::new();
        let mut all_groups = Vec::new();

        for table in &schema.tables {
            let mut columns = Vec::new();
            let mut table_samples = Vec::new();

            for column_id in &table.columns {
                let column = schema.column(*column_id);
                let is_pii = detection_results.get(&column.column_ref).map(|r| r.is_pii).unwrap_or(false);
                if is_pii {
                    continue;
                }
                let sample = samples.get(&column.column_ref).cloned().unwrap_or_else(|| SampleData::empty(column.column_ref.clone()));
                columns.push(column.clone());
                table_samples.push(sample);
            }

            if columns.len() < 2 {
                continue;
            }

            let groups = analyzer.analyze(&columns, &table_samples, qi_config);
            for mut group in groups {
                group.group_id = format!("{}.{}", table.name, group.group_id);

                for member in &group.members {
                    if let Some(result) = detection_results.get_mut(member) {
                        let correlated: Vec<ColumnRef> = group.members.iter().filter(|m| *m != member).cloned().collect();
                        result.quasi_identifier = Some(pii_protocol::QiMembership {
                            group_id: group.group_id.clone(),
                            risk_score: group.re_identification_risk,
                            correlated_columns: correlated,
                        });
                    }
                }

                progress
                    .emit(ScanEventKind::QiGroupFormed { group_id: group.group_id.clone(), members: group.members.clone() })
                    .await;
                all_groups.push(group);
            }
        }

        all_groups
    }

    async fn transition(&self, job: &Arc<RwLock<Job>>, phase: Phase, error_message: Option<String>, report: Option<ComplianceReport>) {
        let mut job = job.write().await;
        job.phase = phase;
        job.last_transition = chrono::Utc::now();
        if phase.is_terminal() {
            job.ended_at = Some(job.last_transition);
        }
        if error_message.is_some() {
            job.error_message = error_message;
        }
        if report.is_some() {
            job.report = report;
        }
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(ScanError::cancelled());
    }
    Ok(())
}

fn merge_config(request: &ScanRequest) -> ScanConfig {
    ScanConfig {
        sampling: request.sampling.clone().unwrap_or_default(),
        detection: request.detection.clone().unwrap_or_default(),
        qi: request.qi.clone().unwrap_or_default(),
    }
}

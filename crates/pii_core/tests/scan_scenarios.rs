//! End-to-end scenarios against a real (in-memory SQLite) connection,
//! covering scan.md's S1-S6 acceptance scenarios. Each test drives the full
//! `ScanOrchestrator` pipeline: metadata extraction, sampling, detection,
//! QI analysis, report assembly.

use async_trait::async_trait;
use pii_core::{NerClientFactory, ScanOrchestrator};
use pii_db::{static_provider, ConnectionProvider};
use pii_detect::{CircuitBreaker, NerClient, NerEntity};
use pii_protocol::{
    CircuitBreakerConfig, ConnectionId, DetectionConfig, NerConfig, Phase, PiiType, QiConfig,
    SamplingConfig, ScanRequest,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// `NerClientFactory` whose `NerClient` always fails and counts calls, so
/// S2/S5 can assert the NER strategy was (or wasn't) invoked without a
/// live NER service.
struct FailingNerFactory {
    breaker: Arc<CircuitBreaker>,
    calls: Arc<AtomicUsize>,
}

impl FailingNerFactory {
    fn new(config: &CircuitBreakerConfig) -> Self {
        Self { breaker: Arc::new(CircuitBreaker::new(config)), calls: Arc::new(AtomicUsize::new(0)) }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

struct CountingFailingClient {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl NerClient for CountingFailingClient {
    async fn classify(&self, _values: &[&str]) -> Result<Vec<Vec<NerEntity>>, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err("ner service unreachable".into())
    }
}

impl NerClientFactory for FailingNerFactory {
    fn build(&self, _config: &NerConfig) -> Box<dyn NerClient> {
        Box::new(CountingFailingClient { calls: self.calls.clone() })
    }

    fn breaker(&self) -> Arc<CircuitBreaker> {
        self.breaker.clone()
    }
}

/// A `NerClientFactory` whose client must never be called — S2 fails loudly
/// if it is.
struct UnreachableNerFactory {
    breaker: Arc<CircuitBreaker>,
}

struct PanickingClient;

#[async_trait]
impl NerClient for PanickingClient {
    async fn classify(&self, _values: &[&str]) -> Result<Vec<Vec<NerEntity>>, String> {
        panic!("NER must not be invoked once REGEX already hit stopOnHighConfidence");
    }
}

impl NerClientFactory for UnreachableNerFactory {
    fn build(&self, _config: &NerConfig) -> Box<dyn NerClient> {
        Box::new(PanickingClient)
    }

    fn breaker(&self) -> Arc<CircuitBreaker> {
        self.breaker.clone()
    }
}

/// Opens an in-memory SQLite connection (kept alive for the provider's
/// lifetime via a single-connection pool) and runs `statements` against it.
async fn sqlite_provider(statements: &[&str]) -> (Arc<dyn ConnectionProvider>, ConnectionId) {
    let connection_id = ConnectionId::new("test-conn");
    let mut dsns = HashMap::new();
    dsns.insert(connection_id.clone(), "sqlite::memory:".to_string());
    let provider = static_provider(dsns);

    let conn = provider.acquire(&connection_id).await.expect("acquire sqlite connection");
    for stmt in statements {
        sqlx::query(stmt).execute(&conn.pool).await.unwrap_or_else(|e| panic!("statement failed: {stmt}: {e}"));
    }
    provider.release(conn).await;

    (provider, connection_id)
}

async fn wait_for_terminal(orchestrator: &ScanOrchestrator, job_id: pii_protocol::JobId) -> pii_protocol::Job {
    for _ in 0..200 {
        let job = orchestrator.status(job_id).await.expect("job must exist");
        if job.phase.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job did not reach a terminal phase in time");
}

fn lenient_detection_config() -> DetectionConfig {
    let mut detection = DetectionConfig::default();
    detection.stop_on_high_confidence = true;
    detection
}

fn sampling_config(max_concurrent: usize) -> SamplingConfig {
    SamplingConfig { max_concurrent_db_queries: max_concurrent, ..SamplingConfig::default() }
}

/// S1 — heuristic/regex hit: an `email` column whose sampled values all
/// match the EMAIL pattern scores confidence 1.0, with zero QI groups.
#[tokio::test]
async fn s1_email_column_is_detected_with_full_confidence() {
    let (provider, connection_id) = sqlite_provider(&[
        "CREATE TABLE users (email TEXT, name TEXT)",
        "INSERT INTO users VALUES ('a@x.io', 'Alice'), ('b@y.io', 'Bob'), ('c@z.io', 'Carol')",
    ])
    .await;

    let ner_factory = Arc::new(FailingNerFactory::new(&CircuitBreakerConfig::default()));
    let orchestrator = ScanOrchestrator::new(provider, ner_factory);

    let mut request = ScanRequest::new(connection_id);
    request.sampling = Some(sampling_config(2));
    request.detection = Some(lenient_detection_config());
    request.qi = Some(QiConfig::default());

    let job_id = orchestrator.submit(request).await.expect("submit");
    let job = wait_for_terminal(&orchestrator, job_id).await;
    assert_eq!(job.phase, Phase::Completed, "job failed: {:?}", job.error_message);

    let report = orchestrator.report(job_id).await.expect("report");
    let email_findings: Vec<_> =
        report.findings.iter().filter(|f| f.column_ref.column == "email").collect();
    assert_eq!(email_findings.len(), 1);
    assert_eq!(email_findings[0].pii_type, PiiType::Email);
    assert_eq!(email_findings[0].confidence, 1.0);
    assert!(report.qi_groups.is_empty());
}

/// S2 — stop-on-high-confidence: once REGEX alone clears the reporting
/// threshold for `email`, NER must never be invoked for that column.
#[tokio::test]
async fn s2_ner_is_skipped_once_regex_clears_the_threshold() {
    let (provider, connection_id) = sqlite_provider(&[
        "CREATE TABLE users (email TEXT)",
        "INSERT INTO users VALUES ('a@x.io'), ('b@y.io'), ('c@z.io')",
    ])
    .await;

    let ner_factory = Arc::new(UnreachableNerFactory { breaker: Arc::new(CircuitBreaker::new(&CircuitBreakerConfig::default())) });
    let orchestrator = ScanOrchestrator::new(provider, ner_factory);

    let mut request = ScanRequest::new(connection_id);
    request.detection = Some(lenient_detection_config());

    let job_id = orchestrator.submit(request).await.expect("submit");
    let job = wait_for_terminal(&orchestrator, job_id).await;
    assert_eq!(job.phase, Phase::Completed, "job failed: {:?}", job.error_message);
}

/// S3 — QI formation: two non-PII, correlated columns cluster into one
/// quasi-identifier group with zero re-identification risk when every
/// combination repeats.
#[tokio::test]
async fn s3_correlated_non_pii_columns_form_a_qi_group() {
    let mut inserts = Vec::new();
    // 100 rows, 5 distinct (gender, zip) combinations each repeated 20
    // times: zip fully determines gender (Cramer's V = 1.0), and every
    // tuple recurs, so singletonCombinations == 0.
    let zip_gender = [("10001", "M"), ("10002", "M"), ("10003", "F"), ("10004", "F"), ("10005", "F")];
    for i in 0..100usize {
        let (zip, gender) = zip_gender[i % zip_gender.len()];
        inserts.push(format!("('{gender}', '{zip}')"));
    }
    let insert_sql = format!("INSERT INTO people (gender, zip) VALUES {}", inserts.join(", "));

    let (provider, connection_id) =
        sqlite_provider(&["CREATE TABLE people (gender TEXT, zip TEXT)", &insert_sql]).await;

    let ner_factory = Arc::new(FailingNerFactory::new(&CircuitBreakerConfig::default()));
    let orchestrator = ScanOrchestrator::new(provider, ner_factory);

    let mut request = ScanRequest::new(connection_id);
    request.qi = Some(QiConfig { min_correlation_coefficient: 0.5, min_distinct_count: 2, ..QiConfig::default() });
    request.sampling = Some(SamplingConfig { sample_size: 100, ..SamplingConfig::default() });

    let job_id = orchestrator.submit(request).await.expect("submit");
    let job = wait_for_terminal(&orchestrator, job_id).await;
    assert_eq!(job.phase, Phase::Completed, "job failed: {:?}", job.error_message);

    let report = orchestrator.report(job_id).await.expect("report");
    assert_eq!(report.qi_groups.len(), 1, "expected one QI group, got {:?}", report.qi_groups);
    let group = &report.qi_groups[0];
    assert_eq!(group.members.len(), 2);
    assert_eq!(group.singleton_combinations, 0);
    assert_eq!(group.re_identification_risk, 0.0);
}

/// S4 — cancellation mid-sampling: a job cancelled shortly after submission
/// ends in FAILED, and `report` then fails with NotReady.
#[tokio::test]
async fn s4_cancellation_mid_scan_fails_the_job() {
    let mut columns = Vec::new();
    let mut values = Vec::new();
    for i in 0..50 {
        columns.push(format!("col_{i} TEXT"));
        values.push(format!("'value {i}'"));
    }
    let create_sql = format!("CREATE TABLE wide (id INTEGER, {})", columns.join(", "));
    let insert_sql = format!("INSERT INTO wide VALUES (1, {})", values.join(", "));

    let (provider, connection_id) = sqlite_provider(&[&create_sql, &insert_sql]).await;

    let ner_factory = Arc::new(FailingNerFactory::new(&CircuitBreakerConfig::default()));
    let orchestrator = ScanOrchestrator::new(provider, ner_factory);

    let mut request = ScanRequest::new(connection_id);
    request.sampling = Some(sampling_config(1));

    let job_id = orchestrator.submit(request).await.expect("submit");

    let mut events = orchestrator.subscribe(job_id).await;
    // Cancel as soon as the first column finishes sampling/detecting.
    while let Some(event) = events.recv().await {
        if matches!(event.kind, pii_protocol::ScanEventKind::ColumnCompleted { .. }) {
            orchestrator.cancel(job_id).await.expect("cancel");
            break;
        }
    }

    let job = wait_for_terminal(&orchestrator, job_id).await;
    assert_eq!(job.phase, Phase::Failed);

    let report_result = orchestrator.report(job_id).await;
    assert!(report_result.is_err());
}

/// S5 — NER breaker opens: with `failureThreshold=3` and a NER client that
/// always errors, after the third consecutive invocation the circuit opens
/// and later columns skip the call entirely.
#[tokio::test]
async fn s5_circuit_breaker_stops_calling_a_failing_ner_client() {
    let (provider, connection_id) = sqlite_provider(&[
        "CREATE TABLE notes (bio_a TEXT, bio_b TEXT, bio_c TEXT, bio_d TEXT, bio_e TEXT)",
        "INSERT INTO notes VALUES ('nothing special here', 'still nothing', 'just text', 'more text', 'plain value')",
    ])
    .await;

    let breaker_config = CircuitBreakerConfig { failure_threshold: 3, reset_timeout_seconds: 60 };
    let ner_factory = Arc::new(FailingNerFactory::new(&breaker_config));
    let calls_handle = ner_factory.calls.clone();
    let orchestrator = ScanOrchestrator::new(provider, ner_factory);

    let mut detection = DetectionConfig::default();
    detection.stop_on_high_confidence = true;
    detection.ner.circuit_breaker = breaker_config;

    let mut request = ScanRequest::new(connection_id);
    request.detection = Some(detection);
    request.sampling = Some(sampling_config(1));

    let job_id = orchestrator.submit(request).await.expect("submit");
    let job = wait_for_terminal(&orchestrator, job_id).await;
    assert_eq!(job.phase, Phase::Completed, "job failed: {:?}", job.error_message);

    // 5 columns, none matched by heuristic/regex, so NER runs for each
    // until the breaker trips after the 3rd failure; the remaining 2
    // columns must not reach the client at all.
    assert_eq!(calls_handle.load(Ordering::SeqCst), 3);
}

/// S6 — partial sampling failure: a table with two columns whose sample
/// query fails (a generated column referencing a nonexistent function)
/// alongside healthy columns. The phase completes; the failing columns
/// surface in the report's detection pass with an error annotation rather
/// than aborting the scan.
#[tokio::test]
async fn s6_partial_sampling_failure_does_not_abort_the_scan() {
    let (provider, connection_id) = sqlite_provider(&[
        "CREATE TABLE mixed (\
            good_a TEXT, good_b TEXT, good_c TEXT, good_d TEXT, good_e TEXT, \
            good_f TEXT, good_g TEXT, good_h TEXT, \
            bad_a TEXT GENERATED ALWAYS AS (not_a_real_function(good_a)) VIRTUAL, \
            bad_b TEXT GENERATED ALWAYS AS (not_a_real_function(good_b)) VIRTUAL\
        )",
        "INSERT INTO mixed (good_a, good_b, good_c, good_d, good_e, good_f, good_g, good_h) \
         VALUES ('x', 'y', 'z', 'w', 'v', 'u', 't', 's')",
    ])
    .await;

    let ner_factory = Arc::new(FailingNerFactory::new(&CircuitBreakerConfig::default()));
    let orchestrator = ScanOrchestrator::new(provider, ner_factory);

    let mut request = ScanRequest::new(connection_id);
    request.sampling = Some(sampling_config(2));

    let job_id = orchestrator.submit(request).await.expect("submit");
    let job = wait_for_terminal(&orchestrator, job_id).await;
    assert_eq!(job.phase, Phase::Completed, "expected the 8 healthy columns to carry the scan through; got {:?}", job.error_message);

    let report = orchestrator.report(job_id).await.expect("report");
    assert_eq!(report.counts.columns, 10);
}

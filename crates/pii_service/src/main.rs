//! Operator entry point for the PII scanning engine: config loading,
//! tracing init, and a CLI that submits a scan, tails its progress, and
//! renders the finished report — the one thin binary wiring `pii_db`,
//! `pii_detect`, `pii_qi`, and `pii_core` together, the way `casparian`'s
//! `main.rs` wires its own library crates behind a `clap` CLI.
//!
//! The REST/WebSocket transport named in the spec's scope (§1) stays out
//! of this binary; everything here runs one `ScanOrchestrator` in-process
//! for the lifetime of a single invocation.

mod config;
mod job_store;
mod renderers;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use config::{default_config_path, service_home, ServiceConfig};
use job_store::InMemoryJobStore;
use pii_core::{HttpNerClientFactory, RendererRegistry, ReportRenderer, ScanOrchestrator};
use pii_db::static_provider;
use pii_protocol::{ConnectionId, JobId, Phase, QiConfig, SamplingConfig, SamplingMethod, ScanRequest};
use renderers::{CsvRenderer, JsonRenderer, TextRenderer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "pii_service", about = "PII scanning engine operator CLI")]
struct Cli {
    /// Path to the service config file (connections, scan defaults).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit a scan and run it to completion, printing progress as it goes.
    Scan(ScanArgs),

    /// List the connections registered in the config file.
    Connections,

    /// Show the resolved config file path and its contents.
    Config {
        #[arg(long)]
        json: bool,
    },

    /// Write a default config file if one doesn't already exist.
    InitConfig,
}

#[derive(clap::Args, Debug)]
struct ScanArgs {
    /// Connection id, as registered in the config file's `[[connections]]`.
    #[arg(long)]
    connection: String,

    /// Restrict the scan to `schema.table` (repeatable); default is all tables.
    #[arg(long = "table")]
    tables: Vec<String>,

    #[arg(long, value_enum)]
    method: Option<SamplingMethodArg>,

    #[arg(long)]
    sample_size: Option<u32>,

    #[arg(long)]
    no_entropy: bool,

    #[arg(long)]
    no_qi: bool,

    /// Report format to render once the scan completes.
    #[arg(long, default_value = "text")]
    format: String,

    /// Write the rendered report here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Suppress per-column progress lines; still prints phase changes.
    #[arg(long)]
    quiet: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SamplingMethodArg {
    FirstN,
    Random,
    Stratified,
}

impl From<SamplingMethodArg> for SamplingMethod {
    fn from(value: SamplingMethodArg) -> Self {
        match value {
            SamplingMethodArg::FirstN => SamplingMethod::FirstN,
            SamplingMethodArg::Random => SamplingMethod::Random,
            SamplingMethodArg::Stratified => SamplingMethod::Stratified,
        }
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    match run(cli, &config_path).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:?}");
            std::process::ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let default_filter = "pii_service=info,pii_core=info,pii_db=info,pii_detect=info,pii_qi=info";
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    tracing_subscriber::fmt().with_env_filter(env_filter).with_writer(std::io::stderr).init();
}

async fn run(cli: Cli, config_path: &PathBuf) -> Result<()> {
    match cli.command {
        Commands::Scan(args) => run_scan(args, config_path).await,
        Commands::Connections => run_connections(config_path),
        Commands::Config { json } => run_config(config_path, json),
        Commands::InitConfig => run_init_config(config_path),
    }
}

fn run_connections(config_path: &PathBuf) -> Result<()> {
    let config = ServiceConfig::load_or_default(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if config.connections.is_empty() {
        println!("(no connections registered in {})", config_path.display());
        return Ok(());
    }
    for entry in &config.connections {
        println!("{}", entry.id);
    }
    Ok(())
}

fn run_config(config_path: &PathBuf, json: bool) -> Result<()> {
    let config = ServiceConfig::load_or_default(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    if json {
        let payload = serde_json::json!({
            "home": service_home().to_string_lossy(),
            "config_path": config_path.to_string_lossy(),
            "config_exists": config_path.exists(),
            "connections": config.connections.iter().map(|c| &c.id).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("Home:          {}", service_home().display());
        println!("Config file:   {} (exists: {})", config_path.display(), config_path.exists());
        println!("Connections:   {}", config.connections.len());
        for entry in &config.connections {
            println!("  - {}", entry.id);
        }
    }
    Ok(())
}

fn run_init_config(config_path: &PathBuf) -> Result<()> {
    if config_path.exists() {
        bail!("config file already exists at {}", config_path.display());
    }
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    ServiceConfig::default()
        .save(config_path)
        .with_context(|| format!("writing {}", config_path.display()))?;
    println!("wrote default config to {}", config_path.display());
    Ok(())
}

async fn run_scan(args: ScanArgs, config_path: &PathBuf) -> Result<()> {
    let service_config = ServiceConfig::load_or_default(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let connection_id = ConnectionId::new(args.connection.clone());
    if !service_config.connections.iter().any(|c| c.id == args.connection) {
        bail!(
            "connection '{}' is not registered in {} (see `pii_service connections`)",
            args.connection,
            config_path.display()
        );
    }

    let provider = static_provider(service_config.dsn_map());
    let ner_factory = Arc::new(HttpNerClientFactory::new(&service_config.ner_config()));
    let orchestrator = ScanOrchestrator::with_job_store(provider, ner_factory, Some(Arc::new(InMemoryJobStore::new())));

    let target_tables = args
        .tables
        .iter()
        .map(|t| parse_schema_table(t))
        .collect::<Result<Vec<_>>>()?;

    let mut request = ScanRequest::new(connection_id);
    request.target_tables = target_tables;
    request.sampling = Some(effective_sampling_config(&service_config.sampling, &args));
    request.detection = Some(service_config.detection.clone());
    request.qi = Some(effective_qi_config(&service_config.qi, args.no_qi));

    let job_id = orchestrator.submit(request).await.context("submitting scan")?;
    info!(job_id = %job_id, "scan submitted");

    let mut events = orchestrator.subscribe(job_id).await;
    let cancel_orchestrator = {
        let job_id = job_id;
        let orchestrator = &orchestrator;
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(job_id = %job_id, "received interrupt, requesting cancellation");
                let _ = orchestrator.cancel(job_id).await;
            }
        }
    };

    tokio::select! {
        _ = cancel_orchestrator => {}
        _ = tail_progress(&mut events, args.quiet) => {}
    }

    // A cancellation request only marks the job non-runnable; the driver
    // task may still be mid-column when the select above returns. Poll
    // until it actually reaches a terminal phase rather than assuming so.
    let job = loop {
        let job = orchestrator.status(job_id).await.context("fetching final job status")?;
        if job.phase.is_terminal() {
            break job;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    };
    match job.phase {
        Phase::Completed => {
            println!("scan {job_id} completed");
            render_and_emit(&orchestrator, job_id, &args.format, args.out.as_deref()).await
        }
        Phase::Failed => {
            bail!("scan {job_id} failed: {}", job.error_message.unwrap_or_else(|| "unknown error".to_string()))
        }
        other => bail!("scan {job_id} ended in unexpected phase {other}"),
    }
}

fn parse_schema_table(spec: &str) -> Result<(String, String)> {
    match spec.split_once('.') {
        Some((schema, table)) if !schema.is_empty() && !table.is_empty() => {
            Ok((schema.to_string(), table.to_string()))
        }
        _ => bail!("--table expects `schema.table`, got '{spec}'"),
    }
}

fn effective_sampling_config(base: &SamplingConfig, args: &ScanArgs) -> SamplingConfig {
    let mut config = base.clone();
    if let Some(method) = args.method {
        config.method = method.into();
    }
    if let Some(sample_size) = args.sample_size {
        config.sample_size = sample_size;
    }
    if args.no_entropy {
        config.entropy_enabled = false;
    }
    config
}

fn effective_qi_config(base: &QiConfig, disabled: bool) -> QiConfig {
    let mut config = base.clone();
    if disabled {
        config.enabled = false;
    }
    config
}

/// Prints phase transitions always; per-column and per-finding events only
/// when not `--quiet`. Returns once `ScanCompleted`/`ScanFailed` arrives or
/// the channel closes (job retired from the progress bus).
async fn tail_progress(events: &mut tokio::sync::mpsc::Receiver<pii_protocol::ScanEvent>, quiet: bool) {
    use pii_protocol::ScanEventKind;

    while let Some(event) = events.recv().await {
        match event.kind {
            ScanEventKind::PhaseChanged { phase, message } => {
                println!("[{phase}] {message}");
            }
            ScanEventKind::ColumnStarted { column } if !quiet => {
                println!("  > {column}");
            }
            ScanEventKind::ColumnCompleted { column } if !quiet => {
                println!("  < {column}");
            }
            ScanEventKind::PiiDetected { column, pii_type, confidence } if !quiet => {
                println!("  ! {column} -> {pii_type} ({confidence:.2})");
            }
            ScanEventKind::QiGroupFormed { group_id, members } if !quiet => {
                let names = members.iter().map(|m| m.to_string()).collect::<Vec<_>>().join(", ");
                println!("  # QI group {group_id}: [{names}]");
            }
            ScanEventKind::ScanCompleted { tables, columns, pii_columns, qi_columns } => {
                println!(
                    "scan finished: {tables} tables, {columns} columns, {pii_columns} pii columns, {qi_columns} qi columns"
                );
                return;
            }
            ScanEventKind::ScanFailed { reason } => {
                println!("scan failed: {reason}");
                return;
            }
            _ => {}
        }
    }
}

async fn render_and_emit(
    orchestrator: &ScanOrchestrator,
    job_id: JobId,
    format: &str,
    out: Option<&std::path::Path>,
) -> Result<()> {
    let report = orchestrator.report(job_id).await.context("fetching finished report")?;

    let registry = RendererRegistry::new(vec![
        Box::new(JsonRenderer) as Box<dyn ReportRenderer>,
        Box::new(CsvRenderer),
        Box::new(TextRenderer),
    ]);
    let bytes = registry.render(&report, format).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    match out {
        Some(path) => {
            std::fs::write(path, &bytes).with_context(|| format!("writing report to {}", path.display()))?;
            println!("wrote {format} report to {}", path.display());
        }
        None => {
            std::io::Write::write_all(&mut std::io::stdout(), &bytes)?;
        }
    }

    // Give the progress bus a moment to retire the job's subscriber table
    // before the process exits; harmless if it already has.
    tokio::time::sleep(Duration::from_millis(1)).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_schema_table_splits_on_first_dot() {
        assert_eq!(parse_schema_table("public.users").unwrap(), ("public".to_string(), "users".to_string()));
    }

    #[test]
    fn parse_schema_table_rejects_missing_dot() {
        assert!(parse_schema_table("users").is_err());
    }

    #[test]
    fn parse_schema_table_rejects_empty_parts() {
        assert!(parse_schema_table(".users").is_err());
        assert!(parse_schema_table("public.").is_err());
    }

    #[test]
    fn effective_sampling_config_overrides_only_given_fields() {
        let base = SamplingConfig::default();
        let args = ScanArgs {
            connection: "demo".to_string(),
            tables: Vec::new(),
            method: Some(SamplingMethodArg::FirstN),
            sample_size: Some(50),
            no_entropy: true,
            no_qi: false,
            format: "json".to_string(),
            out: None,
            quiet: false,
        };
        let effective = effective_sampling_config(&base, &args);
        assert_eq!(effective.method, SamplingMethod::FirstN);
        assert_eq!(effective.sample_size, 50);
        assert!(!effective.entropy_enabled);
    }

    #[test]
    fn effective_qi_config_disables_when_requested() {
        let base = QiConfig::default();
        assert!(effective_qi_config(&base, true).enabled == false);
        assert!(effective_qi_config(&base, false).enabled);
    }
}

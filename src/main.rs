use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chain_rpc_scan::candidates::{self, CandidateOptions};
use chain_rpc_scan::chainlist::{self, ChainListSource, DEFAULT_CHAIN_LIST_URL};
use chain_rpc_scan::probe::{HttpProber, DEFAULT_PROBE_TIMEOUT};
use chain_rpc_scan::scanner::{self, DEFAULT_MAX_CONCURRENCY};
use chain_rpc_scan::server::{self, AppState};
use chain_rpc_scan::types::ScanReport;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// chain-rpc-scan — find working public EVM RPC endpoints and check them for EIP-1559 support.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "chain-rpc-scan",
    version,
    about = "Find working public EVM RPC endpoints and check them for EIP-1559 fee-history support.",
    long_about = None
)]
struct Cli {
    /// URL or local path of the chain list (chain id -> { rpcs, rpcWorking }).
    #[arg(long = "chain-list", default_value = DEFAULT_CHAIN_LIST_URL)]
    chain_list: String,

    /// Max chains probed concurrently. URLs of a chain are always probed together.
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENCY)]
    concurrency: usize,

    /// Per-probe HTTP timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = DEFAULT_PROBE_TIMEOUT.as_millis() as u64)]
    timeout_ms: u64,

    /// Also scan chains the registry already marks with `rpcWorking: true`.
    #[arg(long = "include-known-working", default_value_t = false)]
    include_known_working: bool,

    /// Write the full report as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Start the HTTP scan API instead of running a single scan.
    #[arg(long = "serve-ui", default_value_t = false)]
    serve_ui: bool,

    /// Bind address for the HTTP scan API.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(env_filter)
        .init();

    tracing::info!(
        chain_list = %cli.chain_list,
        concurrency = cli.concurrency,
        timeout_ms = cli.timeout_ms,
        include_known_working = cli.include_known_working,
        output = %cli.output.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "<none>".to_string()),
        serve_ui = cli.serve_ui,
        "chain-rpc-scan configuration"
    );

    let timeout = Duration::from_millis(cli.timeout_ms);
    // Probes and the chain list fetch each set their own per-request timeout.
    let client = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;

    if cli.serve_ui {
        tokio::select! {
            res = server::spawn_server(&cli.bind, AppState::new(client, cli.concurrency, timeout)) => res?,
            _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
        }
        return Ok(());
    }

    let source = ChainListSource::parse(&cli.chain_list);
    let raw = chainlist::fetch_chain_list(&client, &source)
        .await
        .with_context(|| format!("failed to get RPC URLs from {source}"))?;

    let options = CandidateOptions {
        skip_known_working: !cli.include_known_working,
    };
    let candidates = candidates::build_candidates(&raw, &options);
    tracing::info!(chains = candidates.len(), "built scan candidates");

    let prober = Arc::new(HttpProber::with_client(client, timeout));
    let results = scanner::scan(candidates, cli.concurrency, prober).await;
    let report = scanner::into_report(results, &source.to_string());

    println!("{}", serde_json::to_string_pretty(&report.results)?);

    if let Some(path) = cli.output.as_deref() {
        if let Err(e) = write_report_json(path, &report) {
            tracing::error!("failed to write JSON to {}: {e:#}", path.display());
        } else {
            tracing::info!("wrote JSON report to {}", path.display());
        }
    }

    Ok(())
}

fn write_report_json(path: &std::path::Path, report: &ScanReport) -> anyhow::Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}

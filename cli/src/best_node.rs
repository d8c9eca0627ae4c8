//! # best_node
//!
//! Probes every node of a subscription file with a plain TCP connect, ranks
//! them by latency and prints the name of the fastest reachable node on
//! stdout. Progress and a Top-N table go to stderr, so the output can be used
//! directly in shell scripts:
//!
//! ```text
//! BEST=$(best_node --subscription nodes.yaml) || exit 1
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueHint};
use colored::Colorize;
use lib_common::loggers::init_tracing;
use lib_common::probe::{load_targets, run_round, ProbeFailure, ProbeOptions, ProbeResult, RankedList};
use tracing::{info, warn};

/// CLI arguments for best_node.
#[derive(Parser, Debug)]
#[clap(
    name = "best_node",
    version,
    author = "ckir",
    about = "Finds the lowest-latency reachable node in a subscription file.",
    long_about = "Reads the `proxies` list of a YAML subscription, TCP-probes every node concurrently \
                  and prints the name of the fastest reachable one on stdout. \
                  Exits with status 1 when no node is reachable."
)]
struct Cli {
    /// Subscription YAML file with a `proxies` list.
    #[clap(long, short = 's', value_hint = ValueHint::FilePath)]
    subscription: PathBuf,

    /// Maximum number of probes in flight.
    #[clap(long, short = 'w', env = "PROBE_WORKERS", default_value_t = ProbeOptions::DEFAULT_CONCURRENCY)]
    workers: usize,

    /// Per-node connect timeout in milliseconds.
    #[clap(long, env = "PROBE_TIMEOUT_MS", default_value_t = ProbeOptions::DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// How many ranked nodes to show in the table.
    #[clap(long, short = 't', default_value_t = 10)]
    top: usize,

    /// Directory for log files. Logs go to stderr only when unset.
    #[clap(long, env = "LOG_DIR", value_hint = ValueHint::DirPath)]
    log_dir: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset.
    #[clap(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Cli {
    fn probe_options(&self) -> ProbeOptions {
        ProbeOptions {
            timeout: Duration::from_millis(self.timeout_ms.max(1)),
            concurrency: self.workers.max(1),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = init_tracing("best_node", cli.log_dir.as_deref(), &cli.log_level)
        .context("failed to initialise logging")?;

    let targets = load_targets(&cli.subscription)
        .with_context(|| format!("failed to load nodes from {}", cli.subscription.display()))?;
    let options = cli.probe_options();
    info!(
        nodes = targets.len(),
        workers = options.concurrency,
        timeout_ms = options.timeout.as_millis() as u64,
        "probing nodes"
    );

    let ranked = run_round(&targets, &options).await;
    eprint!("{}", render_table(&ranked, cli.top));

    match ranked.require_best() {
        Ok(best) => {
            println!("{}", best.target.name);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            warn!(error = %e, "no node selected");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn failure_label(failure: Option<&ProbeFailure>) -> String {
    match failure {
        Some(ProbeFailure::Timeout) => "timeout".to_string(),
        Some(ProbeFailure::Refused) => "refused".to_string(),
        Some(ProbeFailure::InvalidTarget) => "invalid".to_string(),
        Some(ProbeFailure::Io(detail)) => format!("error: {detail}"),
        None => "unreachable".to_string(),
    }
}

fn render_row(rank: usize, result: &ProbeResult) -> String {
    let name = &result.target.name;
    let address = result.target.address();
    match result.latency_ms {
        Some(ms) if result.reachable => {
            let latency = format!("{ms:>6} ms");
            let latency = if ms < 200 {
                latency.green()
            } else if ms < 800 {
                latency.yellow()
            } else {
                latency.red()
            };
            format!("{rank:>3}. {latency}  {name}  ({address})\n")
        }
        _ => {
            let label = format!("{:>9}", failure_label(result.failure.as_ref())).red();
            format!("{rank:>3}. {label}  {name}  ({address})\n")
        }
    }
}

/// Top-N table plus a one-line summary.
fn render_table(ranked: &RankedList, top: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", format!("Top {} of {} nodes", top.min(ranked.len()), ranked.len()).bold()));
    for (i, result) in ranked.top(top).iter().enumerate() {
        out.push_str(&render_row(i + 1, result));
    }
    let reachable = ranked.reachable_count();
    let summary = format!("{reachable}/{} reachable", ranked.len());
    let summary = if reachable == 0 { summary.red() } else { summary.green() };
    out.push_str(&format!("{summary}\n"));
    out
}

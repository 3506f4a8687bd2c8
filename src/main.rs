// ABOUTME: Command-line front end for submitting, stopping and watching diagnostic jobs
// ABOUTME: Renders the reconciler's job table and forwards operator intents to it

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use diagsync::config::{
    DEFAULT_MAX_CONNECTIONS, DEFAULT_PORT, DEFAULT_THREAD_COUNT, DEFAULT_TIMEOUT_SECS,
};
use diagsync::console::{run_console, stop_outcome_message, USAGE};
use diagsync::{JobDraft, JobRecord, PollingScheduler, Reconciler, RemoteClient, Settings};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "diagsync", version, about = "Submit, stop and track remote diagnostic jobs")]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the diagnostic worker, overrides settings
    #[arg(long, global = true)]
    worker_url: Option<String>,

    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit a new diagnostic job
    Start {
        #[arg(long)]
        target: String,
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u32,
        #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
        max_connections: u32,
        #[arg(long, default_value_t = DEFAULT_THREAD_COUNT)]
        threads: u32,
        /// Per-connection timeout in seconds (1-10)
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: u32,
    },
    /// Stop the job running against TARGET
    Stop { target: String },
    /// Show running jobs once
    Status,
    /// Poll until Ctrl-C; type `r` to refresh, `s <target>` to stop, `q` to quit
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(url) = cli.worker_url.clone() {
        settings.worker_url = url;
        settings.validate()?;
    }

    let client = RemoteClient::new(settings.worker_url().to_string(), settings.request_timeout())
        .context("Failed to set up worker client")?;
    let reconciler = Reconciler::new(Arc::new(client));

    match cli.command {
        Commands::Start {
            target,
            port,
            max_connections,
            threads,
            timeout,
        } => {
            let draft = JobDraft {
                target,
                port,
                max_connections,
                thread_count: threads,
                timeout_secs: timeout,
            };
            let config = reconciler
                .submit(&draft)
                .await
                .context("Failed to start job")?;
            println!("Diagnostic job for {} has been initiated", config.target());
            print_table(&reconciler.records());
        }
        Commands::Stop { target } => {
            if let Err(e) = reconciler.refresh().await {
                warn!("Could not load current jobs: {}", e);
            }
            reconciler
                .request_stop(&target)
                .await
                .with_context(|| format!("Failed to stop job for {}", target))?;
            println!(
                "{}",
                stop_outcome_message(&target, reconciler.phase_of(&target))
            );
            print_table(&reconciler.records());
        }
        Commands::Status => {
            reconciler
                .refresh()
                .await
                .context("Failed to fetch status")?;
            print_table(&reconciler.records());
        }
        Commands::Watch => watch(reconciler, PollingScheduler::new(settings.poll_interval())).await?,
    }

    Ok(())
}

async fn watch(reconciler: Reconciler, scheduler: PollingScheduler) -> Result<()> {
    let commands = spawn_stdin_reader()?;
    info!(
        "Watching jobs every {:?}; Ctrl-C to quit ({})",
        scheduler.interval(),
        USAGE
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for Ctrl-C: {}", e);
        }
    };
    run_console(reconciler, scheduler, commands, shutdown, print_table).await;
    Ok(())
}

/// Reads stdin on a plain thread. A blocking read parked there never holds up
/// runtime shutdown, and EOF just closes the channel.
fn spawn_stdin_reader() -> Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        })
        .context("Failed to spawn stdin reader")?;
    Ok(rx)
}

fn print_table(records: &[JobRecord]) {
    if records.is_empty() {
        println!("No active processes");
        return;
    }

    let width = records
        .iter()
        .map(|r| r.target.len())
        .max()
        .unwrap_or(0)
        .max("TARGET".len());
    println!("{:<width$}  PHASE", "TARGET", width = width);
    for record in records {
        println!("{:<width$}  {}", record.target, record.phase, width = width);
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

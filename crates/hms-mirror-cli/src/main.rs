//! hms-mirror CLI - Hive metastore migration planner.

use clap::{Parser, Subcommand};
use hms_mirror::{
    Config, DataStrategy, MirrorError, MirrorResult, Orchestrator, ScriptExecutor, SnapshotFetcher,
};
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "hms-mirror")]
#[command(about = "Hive metastore migration planner")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Path to the YAML metadata snapshot of both clusters
    #[arg(short, long, default_value = "metadata.yaml")]
    snapshot: PathBuf,

    /// Directory for scripts, reports and distcp plans
    #[arg(short, long, default_value = "hms-mirror-output")]
    output_dir: PathBuf,

    /// Path to state file for resume capability
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Timeout in seconds for graceful shutdown (default: 60)
    #[arg(long, default_value = "60")]
    shutdown_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Overrides {
    /// Override the data strategy (e.g. SCHEMA_ONLY, SQL, HYBRID)
    #[arg(short = 'd', long)]
    data_strategy: Option<DataStrategy>,

    /// Comma-separated databases to migrate, replacing the configured list
    #[arg(long, value_delimiter = ',')]
    databases: Option<Vec<String>>,

    /// Override number of tables planned in parallel
    #[arg(long)]
    concurrency: Option<usize>,

    /// Execute the planned statements instead of only writing them out
    #[arg(short = 'e', long)]
    execute: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan (and optionally execute) a migration
    Run {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Resume a previously interrupted run
    Resume {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Validate the configuration without planning
    Validate,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MirrorError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match &cli.command {
        Commands::Validate => {
            if cli.output_json {
                println!("{}", serde_json::json!({ "valid": true, "config_hash": config.hash() }));
            } else {
                println!("Configuration is valid");
                println!("  Strategy: {}", config.data_strategy);
                println!("  Databases: {}", config.databases.join(", "));
            }
            Ok(())
        }

        Commands::Run { overrides } => {
            overrides.apply(&mut config);
            let orchestrator = build_orchestrator(&cli, config)?;
            let cancel_token = setup_signal_handler(cli.shutdown_timeout).await?;
            let run = orchestrator.run(cancel_token.clone());
            let result = finish_within(run, &cancel_token, shutdown_timeout(&cli)).await?;
            print_result(&result, cli.output_json, "Run")
        }

        Commands::Resume { overrides } => {
            // State file is required for resume
            let state_file = cli.state_file.clone().ok_or_else(|| {
                MirrorError::Config("--state-file is required for resume".to_string())
            })?;
            if !state_file.exists() {
                return Err(MirrorError::Config(format!(
                    "State file not found: {:?}",
                    state_file
                )));
            }

            overrides.apply(&mut config);
            let orchestrator = build_orchestrator(&cli, config)?.resume()?;
            info!("Resuming from previous state");
            let cancel_token = setup_signal_handler(cli.shutdown_timeout).await?;
            let run = orchestrator.run(cancel_token.clone());
            let result = finish_within(run, &cancel_token, shutdown_timeout(&cli)).await?;
            print_result(&result, cli.output_json, "Resumed run")
        }
    }
}

impl Overrides {
    fn apply(&self, config: &mut Config) {
        if let Some(strategy) = self.data_strategy {
            config.data_strategy = strategy;
        }
        if let Some(databases) = &self.databases {
            config.databases = databases.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.transfer.concurrency = concurrency;
        }
        if self.execute {
            config.execute = true;
        }
    }
}

fn build_orchestrator(cli: &Cli, config: Config) -> Result<Orchestrator, MirrorError> {
    let fetcher = Arc::new(SnapshotFetcher::load(&cli.snapshot)?);
    info!("Loaded metadata snapshot from {:?}", cli.snapshot);

    let mut orchestrator =
        Orchestrator::new(config, fetcher).with_output_dir(cli.output_dir.clone());
    if orchestrator.config().execute {
        let executor = ScriptExecutor::new(cli.output_dir.clone(), "hms-mirror");
        orchestrator = orchestrator.with_executor(Arc::new(executor));
    }
    if let Some(ref path) = cli.state_file {
        orchestrator = orchestrator.with_state_file(path.clone());
    }
    Ok(orchestrator)
}

fn shutdown_timeout(cli: &Cli) -> Duration {
    Duration::from_secs(cli.shutdown_timeout)
}

/// Drive `run` to completion, giving it at most `timeout` once `cancel` fires.
async fn finish_within<T>(
    run: impl Future<Output = Result<T, MirrorError>>,
    cancel: &CancellationToken,
    timeout: Duration,
) -> Result<T, MirrorError> {
    tokio::pin!(run);
    tokio::select! {
        result = &mut run => result,
        _ = cancel.cancelled() => {
            match tokio::time::timeout(timeout, &mut run).await {
                Ok(result) => result,
                Err(_) => {
                    eprintln!(
                        "Shutdown timeout of {}s exceeded, abandoning in-flight tables",
                        timeout.as_secs()
                    );
                    Err(MirrorError::Cancelled)
                }
            }
        }
    }
}

fn print_result(result: &MirrorResult, output_json: bool, label: &str) -> Result<(), MirrorError> {
    if output_json {
        println!("{}", result.to_json()?);
        return Ok(());
    }

    let mode = if result.dry_run { "dry run" } else { "executed" };
    println!("\n{} {} ({})", label, result.status.replace('_', " "), mode);
    println!("  Run ID: {}", result.run_id);
    println!("  Strategy: {}", result.data_strategy);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!(
        "  Tables: {}/{} ({} carried over, {} skipped)",
        result.tables_success + result.tables_carried_over,
        result.tables_total,
        result.tables_carried_over,
        result.tables_skipped
    );
    if !result.failed_tables.is_empty() {
        println!("  Failed tables: {:?}", result.failed_tables);
    }
    println!("  Output files: {}", result.output_files.len());
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
async fn setup_signal_handler(shutdown_timeout: u64) -> Result<CancellationToken, MirrorError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token_int = cancel_token.clone();
    tokio::spawn(async move {
        sigint.recv().await;
        eprintln!(
            "\nReceived SIGINT. Finishing in-flight tables (timeout: {}s)...",
            shutdown_timeout
        );
        token_int.cancel();
    });

    let token_term = cancel_token.clone();
    tokio::spawn(async move {
        sigterm.recv().await;
        eprintln!(
            "\nReceived SIGTERM. Finishing in-flight tables (timeout: {}s)...",
            shutdown_timeout
        );
        token_term.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
async fn setup_signal_handler(_shutdown_timeout: u64) -> Result<CancellationToken, MirrorError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Finishing in-flight tables...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}

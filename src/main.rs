//! berth binary: parse flags, install signal handlers, run the supervisor.
//!
//! This is the only place a fatal error turns into a process exit.

use std::process::ExitCode;
use std::sync::Arc;

use berth::cli::Args;
use berth::core::{OsSignals, RunSummary, Supervisor, SupervisorError, SystemRunner};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the console log stream.
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(args.log_filter(rust_log.as_deref()))
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(summary) => {
            info!(signal = %summary.signal, "exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<RunSummary, SupervisorError> {
    let config = args.into_config()?;
    info!(
        instance = %config.instance,
        start = config.start_enabled,
        stop = config.stop_enabled,
        shmem_mb = config.shmem_mb,
        version = env!("CARGO_PKG_VERSION"),
        "berth starting"
    );

    // Installed before startup so an early signal is not lost.
    let signals = OsSignals::install()?;
    Supervisor::new(config, Arc::new(SystemRunner::new()))
        .run(signals)
        .await
}

fn report(err: &SupervisorError) {
    error!(kind = ?err.kind(), "{err}");
    for hint in err.hints() {
        error!("possible cause: {hint}");
    }
}

mod cli;
mod error;
mod progress;
mod report;

use std::process;

use clap::Parser;
use tessera_engine::Orchestrator;
use tracing::{error, info};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::cli::Args;
use crate::error::{AppError, Result};
use crate::progress::SegmentBars;

/// Timestamps in the local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose, args.quiet) {
        eprintln!("Error: {e}");
        process::exit(e.exit_code());
    }

    if let Err(e) = run(args).await {
        error!("{e}");
        if matches!(
            e,
            AppError::Engine(tessera_engine::TesseraError::Usage { .. })
        ) {
            info!("Usage: tessera <page_url> [run_id]");
        }
        process::exit(e.exit_code());
    }
}

async fn run(args: Args) -> Result<()> {
    let run_id = args.run_id();
    if let Some(page) = &args.page_url {
        info!("Using URL from command: {page} (id: {run_id})");
    }

    let mut orchestrator = Orchestrator::from_config(args.to_config(), args.direct)?;
    if !args.quiet {
        orchestrator = orchestrator.with_progress(SegmentBars::new().into_callback());
    }

    let report = orchestrator.run(args.page_url.as_deref(), &run_id).await?;
    report::log_run_summary(&report);
    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("tessera=debug,tessera_engine=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("tessera=info,tessera_engine=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(verbose).with_timer(LocalTimer))
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))
}

mod cli;
mod console;
mod files;

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use sel_relay_lib::{DownloadOutcome, DownloadReport, DownloadWorkflow, RelaySession, SessionConfig, WorkflowConfig};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;
use console::ConsolePrompter;
use files::{DirectorySink, is_valid_ipv4, prepare_dir};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;

    let mut prompter = ConsolePrompter::new().context("Failed to start the console reader")?;
    let host = match cli.ip.as_deref().filter(|ip| is_valid_ipv4(ip)) {
        Some(ip) => ip.to_string(),
        None => console::ask_ip(&mut prompter).await.context("No relay address entered")?,
    };
    let dir = prepare_dir(cli.dir.as_deref())?;

    let mut config = SessionConfig::new(host, cli.port);
    config.show_progress = !cli.no_progress;
    info!(addr = %config.addr(), "SEL relay");

    let session = RelaySession::new(config);
    let mut workflow = DownloadWorkflow::new(session, prompter, DirectorySink::new(dir), WorkflowConfig::default());

    let outcome = tokio::select! {
        res = workflow.run(cli.request()) => Some(res),
        _ = shutdown_signal() => {
            warn!("Termination signal received, closing the relay session");
            None
        }
    };
    workflow.shutdown().await;

    match outcome {
        Some(Ok(DownloadOutcome::Completed(report))) => print_summary(&report),
        Some(Ok(DownloadOutcome::Cancelled(reason))) => info!(%reason, "Download cancelled"),
        Some(Err(e)) => {
            error!("Download failed: {}", e);
            return Err(e).context("Download failed");
        }
        None => {}
    }

    println!("Wishing you all the best in your work.");
    Ok(())
}

fn print_summary(report: &DownloadReport) {
    info!(
        model = %report.model,
        fid = ?report.firmware_id,
        events = report.events.len(),
        "Download finished"
    );
    for event in &report.events {
        let status = if event.succeeded { "saved" } else { "FAILED" };
        println!("{:>6}  {}  {}", event.event.record_number, status, event.artifact);
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn setup_logging(log_file_path: Option<PathBuf>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_thread_ids(false)
        .without_time();

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::create(path).with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // -v raises the default INFO to DEBUG, -q lowers it; RUST_LOG still wins.
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

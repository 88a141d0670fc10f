//! Binary-side collaborators: configuration, prompts, progress and exit codes.

pub(crate) mod config;
pub(crate) mod exit_handler;
pub(crate) mod operator;
pub(crate) mod progress;
pub(crate) mod terminal;

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result};
use catalog_sync_core::download::{TransferSettings, TransferProgress};
use catalog_sync_core::session::{Session, SessionConfig, open_store};
use catalog_sync_core::{
    CatalogClient, FixedAnswer, HttpClient, InterruptSignal, Operator, RunSummary, TransferEngine,
};
use tracing::{error, info, warn};

use crate::cli::Args;
use exit_handler::{ProcessExit, determine_exit_outcome};

/// Runs one sync and maps the result to an exit outcome.
pub(crate) async fn run(args: Args) -> ProcessExit {
    match execute(&args).await {
        Ok(summary) => {
            let exit = determine_exit_outcome(&summary);
            match exit {
                ProcessExit::Interrupted => info!("Interrupted. Run again to resume."),
                ProcessExit::Partial => warn!(
                    partial = summary.partial,
                    failed = summary.failed,
                    "Some items are unfinished and will resume on the next run"
                ),
                ProcessExit::Success | ProcessExit::Failure => {}
            }
            exit
        }
        Err(err) => {
            error!("{err:#}");
            ProcessExit::Failure
        }
    }
}

async fn execute(args: &Args) -> Result<RunSummary> {
    let file_config = config::load_file_config(args.config.as_deref())?;
    let settings = config::merge(args, file_config)?;

    let operator: Box<dyn Operator> = if args.no_input || !io::stdin().is_terminal() {
        Box::new(FixedAnswer(false))
    } else {
        Box::new(operator::TerminalOperator)
    };

    let signal = InterruptSignal::new();
    spawn_interrupt_listener(signal.clone());

    let store = open_store(&settings.directory, operator.as_ref()).await?;

    let http = HttpClient::with_connect_timeout(settings.connect_timeout)
        .context("Failed to build HTTP client")?
        .with_api_key(settings.api_key.clone());
    let catalog = CatalogClient::new(
        http.inner().clone(),
        &settings.api_base_url,
        settings.api_key.clone(),
    )?;

    let show_progress = terminal::should_show_progress(
        io::stderr().is_terminal(),
        args.quiet,
        terminal::is_dumb_terminal(),
    );
    let progress: Arc<dyn TransferProgress> = Arc::new(progress::BarProgress::new(show_progress));

    let mut transfer_settings = TransferSettings::new(&settings.directory, settings.quality);
    transfer_settings.idle_timeout = settings.idle_timeout;
    let engine = TransferEngine::new(http, transfer_settings).with_progress(progress);

    let session_config = SessionConfig {
        directory: settings.directory.clone(),
        quality: settings.quality,
        excluded_categories: settings.excluded_categories.clone(),
        backfill_days: settings.backfill_days,
    };

    info!(
        directory = %settings.directory.display(),
        quality = %settings.quality,
        "catalog-sync starting"
    );

    let summary = Session {
        config: &session_config,
        source: &catalog,
        store: &store,
        engine: &engine,
        operator: operator.as_ref(),
        signal: &signal,
    }
    .run()
    .await?;

    store.close().await;
    Ok(summary)
}

/// Forwards every Ctrl+C to `signal` for the rest of the process.
fn spawn_interrupt_listener(signal: InterruptSignal) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received");
            signal.trigger();
        }
    });
}

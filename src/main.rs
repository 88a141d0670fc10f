//! CLI entry point for catalog-sync.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

mod app;
mod cli;

use app::exit_handler::ProcessExit;
use app::terminal;
use cli::Args;

/// How long shutdown waits for a prompt thread still blocked on the terminal.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    terminal::init_tracing(
        terminal::default_log_level(args.quiet, args.verbose),
        terminal::no_color_env_requested() || terminal::is_dumb_terminal(),
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(error = %err, "failed to start async runtime");
            return ProcessExit::Failure.into();
        }
    };

    let exit = runtime.block_on(app::run(args));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    exit.into()
}

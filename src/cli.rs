//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Mirror a remote video catalog into a local directory.
///
/// Each run fetches the most recent catalog entries, skips the ones already
/// handled, and downloads the rest oldest first. Interrupted downloads
/// resume on the next run.
#[derive(Parser, Debug)]
#[command(name = "catalog-sync")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// API key for the remote catalog
    #[arg(short = 'k', long, env = "CATALOG_SYNC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Target directory for videos and the catalog database
    #[arg(short = 'd', long)]
    pub directory: Option<PathBuf>,

    /// Quality tier: hd, high or low
    #[arg(short = 'Q', long)]
    pub quality: Option<String>,

    /// Skip videos whose show title matches exactly (repeatable)
    #[arg(short = 'x', long = "exclude", value_name = "SHOW")]
    pub exclude: Vec<String>,

    /// Days of history marked as handled on first run (0-3650)
    #[arg(short = 'b', long, value_parser = clap::value_parser!(u32).range(0..=3650))]
    pub backfill_days: Option<u32>,

    /// Read configuration from this file instead of the default location
    #[arg(short = 'C', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Base URL of the catalog API
    #[arg(long, value_name = "URL")]
    pub api_base_url: Option<String>,

    /// Answer "no" to every prompt instead of asking
    #[arg(long)]
    pub no_input: bool,
}

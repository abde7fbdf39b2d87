//! Command-line interface definitions.
//!
//! All options can be given as flags; the API key also comes from the
//! `ANTHROPIC_API_KEY` environment variable.

use crate::pipeline::RunMode;
use clap::Parser;
use clap::builder::RangedU64ValueParser;
use std::path::PathBuf;

/// Generate diplomacy trivia questions from current news.
///
/// # Examples
///
/// ```sh
/// # Generate 20 new questions straight into the bank
/// brainburst_refresh --count 20
///
/// # Stage them for review first, then merge
/// brainburst_refresh --count 20 --review
/// brainburst_refresh --approve
///
/// # Preview without writing anything
/// brainburst_refresh --count 10 --dry-run
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Number of questions to ask the model for
    #[arg(long, default_value_t = 10, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub count: usize,

    /// Stage questions in the pending file for manual review
    #[arg(long)]
    pub review: bool,

    /// Approve and merge all pending questions into the bank, then exit
    #[arg(long)]
    pub approve: bool,

    /// Show what would be generated without writing to disk
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Question bank file (overrides the config)
    #[arg(long)]
    pub bank_file: Option<PathBuf>,

    /// Pending questions file (overrides the config)
    #[arg(long)]
    pub pending_file: Option<PathBuf>,

    /// Entries taken from each feed (overrides the config)
    #[arg(long)]
    pub per_feed: Option<usize>,

    /// Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

impl Cli {
    /// Dry run wins over review; neither means commit.
    pub fn mode(&self) -> RunMode {
        if self.dry_run {
            RunMode::DryRun
        } else if self.review {
            RunMode::Review
        } else {
            RunMode::Commit
        }
    }
}

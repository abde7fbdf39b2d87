//! # BrainBurst Refresh
//!
//! Keeps a diplomacy trivia question bank fresh. Current headlines are pulled
//! from RSS/Atom feeds, a language model drafts multiple-choice questions
//! about them, and the questions that pass schema validation and
//! near-duplicate filtering are written to a JSON question bank, either
//! directly or through a pending file that a human approves.
//!
//! ## Usage
//!
//! ```sh
//! brainburst_refresh --count 20            # generate and commit
//! brainburst_refresh --count 20 --review   # stage for review
//! brainburst_refresh --approve             # merge staged questions
//! brainburst_refresh --dry-run             # preview only
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: poll every feed in turn; failed feeds are skipped
//! 2. **Generation**: one model request for the requested number of questions
//! 3. **Validation**: schema checks with per-record reasons
//! 4. **Deduplication**: fuzzy matching against the bank and the batch
//! 5. **Output**: preview, stage, or append to the bank

use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod dedup;
mod generator;
mod models;
mod outputs;
mod pipeline;
mod sources;
mod store;
mod utils;
mod validator;

use api::{messages_client_with_backoff, require_api_key};
use cli::Cli;
use config::PipelineConfig;
use outputs::preview::{render_approval, render_run};
use pipeline::{Pipeline, Run};
use sources::{FeedFetcher, HttpFeedFetcher, NewsSource};
use store::QuestionStore;

#[tokio::main]
#[instrument]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    let args = Cli::parse();

    // --- Tracing init ---
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("brainburst_refresh starting up");
    debug!(count = args.count, mode = ?args.mode(), approve = args.approve, "Parsed CLI arguments");

    let mut config = PipelineConfig::load(args.config.as_deref())?;
    if let Some(path) = args.bank_file.clone() {
        config.bank_file = path;
    }
    if let Some(path) = args.pending_file.clone() {
        config.pending_file = path;
    }
    if let Some(per_feed) = args.per_feed {
        config.max_per_feed = per_feed;
    }
    let store = QuestionStore::new(config.bank_file.clone(), config.pending_file.clone());

    // ---- Approve mode ----
    if args.approve {
        let approval = pipeline::approve(&store).await?;
        print!("{}", render_approval(&approval));
        return Ok(ExitCode::SUCCESS);
    }

    // ---- Generate mode ----
    let fetcher = HttpFeedFetcher::new(Duration::from_secs(config.request_timeout_secs))?;
    let run = generate_questions(&args, config, store, fetcher).await?;
    print!("{}", render_run(&run));

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        success = run.outcome.is_success(),
        "Execution complete"
    );

    if run.outcome.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Check the credential, then build the model client and run the pipeline.
///
/// Nothing reaches the network until the credential is accepted.
async fn generate_questions<F>(
    args: &Cli,
    config: PipelineConfig,
    store: QuestionStore,
    fetcher: F,
) -> Result<Run, Box<dyn Error>>
where
    F: FeedFetcher,
{
    let api_key = require_api_key(args.api_key.clone()).inspect_err(|e| {
        error!(error = %e, "Cannot generate questions without a credential");
    })?;

    let asker = messages_client_with_backoff(
        api_key,
        &config.api_base,
        &config.model,
        config.max_tokens,
        Duration::from_secs(config.request_timeout_secs),
        config.max_retries,
        Duration::from_millis(config.retry_base_delay_ms),
    )?;

    let source = NewsSource::new(config.feeds, fetcher);
    let pipeline = Pipeline::new(source, asker, store, config.max_per_feed);
    Ok(pipeline.run(args.count, args.mode()).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::pipeline::RunOutcome;
    use crate::sources::tests::StaticFeeds;

    fn args(api_key: Option<&str>) -> Cli {
        let mut args = Cli::try_parse_from(["brainburst_refresh", "--count", "3"]).unwrap();
        args.api_key = api_key.map(str::to_string);
        args
    }

    fn store(dir: &tempfile::TempDir) -> QuestionStore {
        QuestionStore::new(dir.path().join("bank.json"), dir.path().join("pending.json"))
    }

    #[tokio::test]
    async fn test_missing_credential_stops_before_any_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = StaticFeeds::default();
        let requested = fetcher.requested.clone();

        for key in [None, Some("   ")] {
            let config = PipelineConfig::default();
            let err = generate_questions(&args(key), config, store(&dir), fetcher.clone())
                .await
                .unwrap_err();
            assert!(matches!(
                err.downcast_ref::<ApiError>(),
                Some(ApiError::MissingCredential)
            ));
        }

        assert!(requested.borrow().is_empty());
        assert!(!dir.path().join("bank.json").exists());
    }

    #[tokio::test]
    async fn test_credential_lets_the_run_reach_the_feeds() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = StaticFeeds::default();
        let requested = fetcher.requested.clone();
        let config = PipelineConfig::default();
        let feeds = config.feeds.len();

        let run = generate_questions(&args(Some("sk-test")), config, store(&dir), fetcher)
            .await
            .unwrap();

        assert_eq!(run.outcome, RunOutcome::NoNews);
        assert_eq!(requested.borrow().len(), feeds);
    }
}

//! The content pipeline: fetch → generate → validate → deduplicate → persist.
//!
//! Stages run strictly in sequence. A stage that yields nothing ends the run
//! with a terminal [`RunOutcome`]; nothing is retried at this level. Only a
//! store failure is an `Err`, since it means the bank on disk cannot be
//! trusted.

use crate::api::AskAsync;
use crate::dedup::dedupe;
use crate::generator::generate;
use crate::models::CandidateQuestion;
use crate::sources::{FeedFetcher, NewsSource};
use crate::store::{QuestionStore, StoreError};
use crate::validator::validate;
use std::path::PathBuf;
use tracing::{info, instrument, warn};

/// What to do with the questions that survive deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Preview only; no file is written.
    DryRun,
    /// Stage in the pending file for human review.
    Review,
    /// Append straight to the bank.
    Commit,
}

/// Counts gathered as the run progresses. Stages not reached stay at zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub requested: usize,
    pub feeds: usize,
    pub news: usize,
    pub generated: usize,
    pub valid: usize,
    pub rejected: usize,
    pub unique: usize,
    pub duplicates: usize,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    NoNews,
    NoneGenerated,
    NoneValid,
    NoneUnique,
    Previewed(Vec<CandidateQuestion>),
    Staged {
        staged: usize,
        pending_total: usize,
        path: PathBuf,
    },
    Committed {
        added: usize,
        bank_total: usize,
        path: PathBuf,
    },
}

impl RunOutcome {
    /// False for the terminal stops (nothing fetched, generated, valid or unique).
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            RunOutcome::Previewed(_) | RunOutcome::Staged { .. } | RunOutcome::Committed { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub report: RunReport,
    pub outcome: RunOutcome,
}

/// Result of merging the pending file into the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Approval {
    pub approved: usize,
    pub bank_total: usize,
}

pub struct Pipeline<F, A> {
    source: NewsSource<F>,
    asker: A,
    store: QuestionStore,
    per_feed: usize,
}

impl<F, A> Pipeline<F, A>
where
    F: FeedFetcher,
    A: AskAsync<Response = String>,
{
    pub fn new(source: NewsSource<F>, asker: A, store: QuestionStore, per_feed: usize) -> Self {
        Self {
            source,
            asker,
            store,
            per_feed,
        }
    }

    /// Run every stage once, asking the model for `count` questions.
    #[instrument(level = "info", skip(self))]
    pub async fn run(&self, count: usize, mode: RunMode) -> Result<Run, StoreError> {
        let mut report = RunReport {
            requested: count,
            feeds: self.source.feed_count(),
            ..RunReport::default()
        };

        let news = self.source.fetch(self.per_feed).await;
        report.news = news.len();
        if news.is_empty() {
            warn!("No news items fetched; stopping");
            return Ok(Run { report, outcome: RunOutcome::NoNews });
        }

        let raw = generate(&self.asker, &news, count).await;
        report.generated = raw.len();
        if raw.is_empty() {
            warn!("No questions generated; stopping");
            return Ok(Run { report, outcome: RunOutcome::NoneGenerated });
        }

        let validation = validate(raw);
        report.valid = validation.accepted.len();
        report.rejected = validation.rejected.len();
        if validation.accepted.is_empty() {
            warn!("No valid questions after validation; stopping");
            return Ok(Run { report, outcome: RunOutcome::NoneValid });
        }

        let bank = self.store.load_bank().await?;
        let dedup = dedupe(validation.accepted, &bank);
        report.unique = dedup.unique.len();
        report.duplicates = dedup.duplicates.len();
        if dedup.unique.is_empty() {
            warn!("All questions were duplicates; stopping");
            return Ok(Run { report, outcome: RunOutcome::NoneUnique });
        }

        let outcome = match mode {
            RunMode::DryRun => {
                info!(count = dedup.unique.len(), "Dry run; nothing written");
                RunOutcome::Previewed(dedup.unique)
            }
            RunMode::Review => {
                let staged = self.store.stage_for_review(dedup.unique).await?;
                RunOutcome::Staged {
                    staged,
                    pending_total: self.store.load_pending().await?.len(),
                    path: self.store.pending_path().to_path_buf(),
                }
            }
            RunMode::Commit => {
                let added = self.store.append_to_bank(dedup.unique).await?;
                RunOutcome::Committed {
                    added,
                    bank_total: bank.len() + added,
                    path: self.store.bank_path().to_path_buf(),
                }
            }
        };
        Ok(Run { report, outcome })
    }
}

/// Merge every pending question into the bank. Touches nothing else.
pub async fn approve(store: &QuestionStore) -> Result<Approval, StoreError> {
    let approved = store.approve_pending().await?;
    let bank_total = store.load_bank().await?.len();
    Ok(Approval {
        approved,
        bank_total,
    })
}

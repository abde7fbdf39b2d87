//! Data models for each stage of the question pipeline.
//!
//! Records move through the pipeline as distinct types rather than one
//! loosely-typed map mutated in place:
//! - [`NewsItem`]: a normalized headline pulled from a feed (never persisted)
//! - [`CandidateQuestion`]: a generated question that passed validation
//! - [`BankQuestion`]: a committed question carrying its permanent `diplo_NNN` id
//! - [`PendingQuestion`]: a staged question awaiting approval (`pending_NNN` id)
//!
//! The two typed wrappers are only used to write new entries. Entries already
//! on disk are read back as [`Record`]s, so fields this crate does not know
//! about survive every rewrite.
//!
//! Raw model output never becomes a [`CandidateQuestion`] directly; it stays a
//! `serde_json::Value` until [`crate::validator::validate`] accepts it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Categories the generator is asked to use.
///
/// The list is advisory: the validator keeps questions with other categories
/// and only logs a warning.
pub const VALID_CATEGORIES: [&str; 15] = [
    "Foreign Policy Disagreements",
    "UN & Multilateral Diplomacy",
    "EU & NATO Affairs",
    "Asia-Pacific Geopolitics",
    "Middle East Diplomacy",
    "Africa & Global South Diplomacy",
    "Bilateral Tensions & Alliances",
    "Economic Diplomacy & Sanctions",
    "International Law & Treaties",
    "US Foreign Policy",
    "Truth vs Narrative",
    "Diplomatic Language & Spin",
    "Historical Diplomatic Milestones",
    "Intelligence & Espionage in Diplomacy",
    "Cyber Diplomacy & Tech Geopolitics",
];

/// Prefix of permanent bank ids (`diplo_000`, `diplo_001`, ...).
pub const BANK_ID_PREFIX: &str = "diplo";

/// Prefix of staging ids (`pending_000`, ...), scoped to the pending file.
pub const PENDING_ID_PREFIX: &str = "pending";

/// A news headline normalized from one feed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    /// Entry headline.
    pub title: String,
    /// Markup-free summary, at most 500 characters. Falls back to the title.
    pub summary: String,
    /// Label of the feed the entry came from (e.g. "BBC World").
    pub source: String,
    /// Entry permalink, empty when the feed did not provide one.
    pub link: String,
}

/// Question difficulty. Serialized in lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Parse an exact lowercase difficulty label.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == s)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated multiple-choice question without an id.
///
/// Only the validator builds these from model output, so every string field
/// is non-blank and `incorrect_answers` holds exactly three non-blank entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateQuestion {
    pub category: String,
    pub difficulty: Difficulty,
    pub question: String,
    pub correct_answer: String,
    pub incorrect_answers: [String; 3],
    pub source: String,
}

impl CandidateQuestion {
    /// Whether the category is one of [`VALID_CATEGORIES`].
    pub fn has_known_category(&self) -> bool {
        VALID_CATEGORIES.contains(&self.category.as_str())
    }
}

/// A question committed to the bank.
///
/// On disk the candidate fields are flattened and followed by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankQuestion {
    #[serde(flatten)]
    pub question: CandidateQuestion,
    pub id: String,
}

impl BankQuestion {
    pub fn new(question: CandidateQuestion, number: u64) -> Self {
        Self {
            question,
            id: format_id(BANK_ID_PREFIX, number),
        }
    }
}

/// A question staged for human review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingQuestion {
    #[serde(flatten)]
    pub question: CandidateQuestion,
    pub id: String,
    /// ISO-8601 UTC time the question was staged.
    pub staged_at: String,
}

impl PendingQuestion {
    pub fn new(question: CandidateQuestion, number: u64, staged_at: String) -> Self {
        Self {
            question,
            id: format_id(PENDING_ID_PREFIX, number),
            staged_at,
        }
    }
}

/// Format `prefix_NNN`, zero padded to at least three digits.
pub fn format_id(prefix: &str, number: u64) -> String {
    format!("{prefix}_{number:03}")
}

/// Parse the numeric part after the first `_` of an id.
pub fn parse_id_number(id: &str) -> Option<u64> {
    id.split('_').nth(1)?.parse().ok()
}

/// One stored entry exactly as it appears in the bank or pending file.
pub type Record = Map<String, Value>;

/// Numeric suffix of a stored entry's `id`, if it has one.
pub fn record_id_number(record: &Record) -> Option<u64> {
    record.get("id")?.as_str().and_then(parse_id_number)
}

/// Question text of a stored entry.
pub fn record_question(record: &Record) -> Option<&str> {
    record.get("question")?.as_str()
}

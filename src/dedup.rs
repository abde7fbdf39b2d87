//! Near-duplicate detection for question texts.
//!
//! Similarity is the longest-matching-block ratio of two lowercased texts:
//! the total size of the matching blocks found by recursively taking the
//! longest common substring, doubled and divided by the combined length.
//! (the Ratcliff/Obershelp measure). For texts of 200 or more characters,
//! characters that occur in more than 1% of positions are left out of the
//! match index. No other normalization is applied, so punctuation and
//! whitespace differences count.

use crate::models::{CandidateQuestion, Record, record_question};
use crate::utils::truncate_for_log;
use std::collections::HashMap;
use tracing::{info, instrument};

/// Ratio at or above which two questions are considered duplicates.
pub const DEDUP_THRESHOLD: f64 = 0.85;

/// Texts at least this long drop characters that are too frequent from the
/// match index.
const AUTOJUNK_MIN_LEN: usize = 200;

/// Case-insensitive similarity ratio in `[0, 1]`; `1.0` means identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = Matcher::new(&a, &b).matching_chars();
    2.0 * matched as f64 / total as f64
}

/// Longest-common-block matcher over two character sequences.
struct Matcher<'a> {
    a: &'a [char],
    b: &'a [char],
    /// Positions of each indexed character of `b`, ascending.
    b2j: HashMap<char, Vec<usize>>,
}

impl<'a> Matcher<'a> {
    fn new(a: &'a [char], b: &'a [char]) -> Self {
        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, &ch) in b.iter().enumerate() {
            b2j.entry(ch).or_default().push(j);
        }

        if b.len() >= AUTOJUNK_MIN_LEN {
            let ntest = b.len() / 100 + 1;
            b2j.retain(|_, positions| positions.len() <= ntest);
        }

        Self { a, b, b2j }
    }

    /// Longest block `a[i..i+k] == b[j..j+k]` inside the given ranges.
    ///
    /// Ties go to the block starting earliest in `a`, then earliest in `b`.
    fn longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
        let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
        let mut j2len: HashMap<usize, usize> = HashMap::new();

        for i in alo..ahi {
            let mut new_j2len = HashMap::new();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j.checked_sub(1).and_then(|prev| j2len.get(&prev)).copied().unwrap_or(0) + 1;
                    new_j2len.insert(j, k);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            j2len = new_j2len;
        }

        // Characters dropped from the index can still extend a block.
        while best_i > alo && best_j > blo && self.a[best_i - 1] == self.b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_size += 1;
        }
        while best_i + best_size < ahi
            && best_j + best_size < bhi
            && self.a[best_i + best_size] == self.b[best_j + best_size]
        {
            best_size += 1;
        }

        (best_i, best_j, best_size)
    }

    /// Total size of all matching blocks.
    fn matching_chars(&self) -> usize {
        let mut matched = 0;
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];

        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let (i, j, k) = self.longest_match(alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            matched += k;
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }

        matched
    }
}

/// Where a duplicate's twin was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchScope {
    /// An existing bank question.
    Bank,
    /// An earlier question of the same batch.
    Batch,
}

/// A candidate dropped as a near-duplicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Duplicate {
    pub question: CandidateQuestion,
    /// Text of the question it matched.
    pub matched: String,
    pub similarity: f64,
    pub scope: MatchScope,
}

/// Outcome of deduplicating one batch.
#[derive(Debug, Default)]
pub struct Dedup {
    /// Surviving candidates, in input order.
    pub unique: Vec<CandidateQuestion>,
    pub duplicates: Vec<Duplicate>,
}

fn first_match<'t>(text: &str, others: impl IntoIterator<Item = &'t str>) -> Option<(&'t str, f64)> {
    others
        .into_iter()
        .map(|other| (other, similarity(text, other)))
        .find(|(_, ratio)| *ratio >= DEDUP_THRESHOLD)
}

/// Drop candidates too similar to the bank or to an earlier candidate.
///
/// Each candidate is first compared with every bank question (entries without
/// a question text are skipped), then with the
/// candidates already kept from this batch. The first match at or above
/// [`DEDUP_THRESHOLD`] wins, so within a batch the first occurrence survives.
#[instrument(level = "info", skip_all, fields(candidates = candidates.len(), bank = existing.len()))]
pub fn dedupe(candidates: Vec<CandidateQuestion>, existing: &[Record]) -> Dedup {
    let mut dedup = Dedup::default();

    for candidate in candidates {
        let bank_match = first_match(
            &candidate.question,
            existing.iter().filter_map(record_question),
        )
        .map(|(text, ratio)| (text.to_string(), ratio, MatchScope::Bank));

        let found = bank_match.or_else(|| {
            first_match(&candidate.question, dedup.unique.iter().map(|q| q.question.as_str()))
                .map(|(text, ratio)| (text.to_string(), ratio, MatchScope::Batch))
        });

        match found {
            Some((matched, ratio, scope)) => {
                info!(
                    similarity_pct = %format!("{:.0}%", ratio * 100.0),
                    ?scope,
                    question = %truncate_for_log(&candidate.question, 80),
                    "Duplicate question dropped"
                );
                dedup.duplicates.push(Duplicate {
                    question: candidate,
                    matched,
                    similarity: ratio,
                    scope,
                });
            }
            None => dedup.unique.push(candidate),
        }
    }

    info!(
        unique = dedup.unique.len(),
        duplicates = dedup.duplicates.len(),
        "Deduplication complete"
    );
    dedup
}

//! JSON-file backed question storage.
//!
//! Two independent collections:
//! - the **bank**: committed questions with permanent `diplo_NNN` ids, append-only
//! - the **pending** file: staged questions with `pending_NNN` ids, deleted once approved
//!
//! Every mutation is a whole-file read-modify-write. Existing entries are
//! carried through as [`Record`]s and written back unchanged, whatever fields
//! they hold; only new entries go through the typed models. There is no
//! locking, so two processes writing the same file at once can lose updates,
//! and a crash mid-write can leave a truncated file. A file that exists but is
//! not a JSON array of objects is an error; it is never treated as empty.

use crate::models::{
    BANK_ID_PREFIX, BankQuestion, CandidateQuestion, PendingQuestion, Record, format_id,
    record_id_number,
};
use crate::outputs::json::write_json_file;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed question file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to serialize questions: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no bank ids left after {last} for {count} new questions")]
    IdsExhausted { last: u64, count: usize },
}

/// Location of the bank and pending files.
#[derive(Debug, Clone)]
pub struct QuestionStore {
    bank_path: PathBuf,
    pending_path: PathBuf,
}

/// Next bank number: one past the highest numeric id suffix, or 0 for an
/// empty bank. Ids without a numeric suffix are ignored.
pub fn next_bank_number(existing: &[Record]) -> Result<u64, StoreError> {
    if existing.is_empty() {
        return Ok(0);
    }
    let last = existing.iter().filter_map(record_id_number).max().unwrap_or(0);
    last.checked_add(1)
        .ok_or(StoreError::IdsExhausted { last, count: 1 })
}

fn to_record<T: Serialize>(value: &T) -> Result<Record, StoreError> {
    Ok(serde_json::from_value(serde_json::to_value(value)?)?)
}

impl QuestionStore {
    pub fn new(bank_path: impl Into<PathBuf>, pending_path: impl Into<PathBuf>) -> Self {
        Self {
            bank_path: bank_path.into(),
            pending_path: pending_path.into(),
        }
    }

    pub fn bank_path(&self) -> &Path {
        &self.bank_path
    }

    pub fn pending_path(&self) -> &Path {
        &self.pending_path
    }

    /// All committed entries; empty if the bank file does not exist yet.
    pub async fn load_bank(&self) -> Result<Vec<Record>, StoreError> {
        load_records(&self.bank_path).await
    }

    /// All staged entries; empty if there is no pending file.
    pub async fn load_pending(&self) -> Result<Vec<Record>, StoreError> {
        load_records(&self.pending_path).await
    }

    /// Give each candidate the next bank id, in order, and rewrite the bank.
    ///
    /// Returns the number of questions added.
    #[instrument(level = "info", skip_all, fields(count = candidates.len()))]
    pub async fn append_to_bank(&self, candidates: Vec<CandidateQuestion>) -> Result<usize, StoreError> {
        self.append_with(candidates, |question, number| {
            to_record(&BankQuestion::new(question, number))
        })
        .await
    }

    /// Append `items` to the bank, numbering them from the next free id.
    ///
    /// Entries already in the bank are written back untouched.
    async fn append_with<T, F>(&self, items: Vec<T>, mut into_record: F) -> Result<usize, StoreError>
    where
        F: FnMut(T, u64) -> Result<Record, StoreError>,
    {
        if items.is_empty() {
            return Ok(0);
        }

        let mut bank = self.load_bank().await?;
        let added = items.len();
        let first = next_bank_number(&bank)?;
        let last = first
            .checked_add(added as u64 - 1)
            .ok_or_else(|| StoreError::IdsExhausted {
                last: first.saturating_sub(1),
                count: added,
            })?;

        for (item, number) in items.into_iter().zip(first..=last) {
            bank.push(into_record(item, number)?);
        }
        write_json_file(&bank, &self.bank_path).await?;

        info!(
            added,
            first_id = %format_id(BANK_ID_PREFIX, first),
            total = bank.len(),
            "Appended questions to bank"
        );
        Ok(added)
    }

    /// Stage candidates in the pending file, stamped with the current time.
    pub async fn stage_for_review(&self, candidates: Vec<CandidateQuestion>) -> Result<usize, StoreError> {
        self.stage_for_review_at(candidates, Utc::now()).await
    }

    /// Stage candidates with an explicit staging time.
    ///
    /// Pending ids continue from the current length of the pending file.
    #[instrument(level = "info", skip_all, fields(count = candidates.len()))]
    pub async fn stage_for_review_at(
        &self,
        candidates: Vec<CandidateQuestion>,
        staged_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut pending = self.load_pending().await?;
        let first = pending.len() as u64;
        let staged = candidates.len();
        let timestamp = staged_at.to_rfc3339_opts(SecondsFormat::Micros, false);

        for (question, number) in candidates.into_iter().zip(first..) {
            pending.push(to_record(&PendingQuestion::new(question, number, timestamp.clone()))?);
        }
        write_json_file(&pending, &self.pending_path).await?;

        info!(staged, total = pending.len(), path = %self.pending_path.display(), "Staged questions for review");
        Ok(staged)
    }

    /// Move every pending entry into the bank and delete the pending file.
    ///
    /// The staging `id` and `staged_at` are dropped and fresh bank ids are
    /// assigned; every other field is kept. With nothing pending this is a
    /// no-op returning 0.
    #[instrument(level = "info", skip_all)]
    pub async fn approve_pending(&self) -> Result<usize, StoreError> {
        let pending = self.load_pending().await?;
        if pending.is_empty() {
            info!("No pending questions to approve");
            return Ok(0);
        }

        let count = self
            .append_with(pending, |mut record, number| {
                record.shift_remove("staged_at");
                record.shift_remove("id");
                record.insert("id".to_string(), Value::String(format_id(BANK_ID_PREFIX, number)));
                Ok(record)
            })
            .await?;
        self.clear_pending().await?;

        info!(count, "Approved and merged pending questions; pending file cleared");
        Ok(count)
    }

    /// Delete the pending file; a missing file is not an error.
    async fn clear_pending(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.pending_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Remove {
                path: self.pending_path.clone(),
                source,
            }),
        }
    }
}

async fn load_records(path: &Path) -> Result<Vec<Record>, StoreError> {
    let text = match fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No file yet; starting empty");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let records: Vec<Record> = serde_json::from_str(&text).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), count = records.len(), "Loaded questions");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    fn candidate(text: &str) -> CandidateQuestion {
        CandidateQuestion {
            category: "International Law & Treaties".to_string(),
            difficulty: Difficulty::Hard,
            question: text.to_string(),
            correct_answer: "Correct".to_string(),
            incorrect_answers: ["W1".to_string(), "W2".to_string(), "W3".to_string()],
            source: "Test".to_string(),
        }
    }

    fn store(dir: &TempDir) -> QuestionStore {
        QuestionStore::new(dir.path().join("bank.json"), dir.path().join("pending.json"))
    }

    fn record(value: Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    async fn bank_ids(store: &QuestionStore) -> Vec<String> {
        store
            .load_bank()
            .await
            .unwrap()
            .into_iter()
            .map(|q| q["id"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_missing_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        assert!(store.load_bank().await.unwrap().is_empty());
        assert!(store.load_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_bank_starts_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let added = store.append_to_bank(vec![candidate("Q1?"), candidate("Q2?")]).await.unwrap();
        assert_eq!(added, 2);
        assert_eq!(bank_ids(&store).await, vec!["diplo_000", "diplo_001"]);
    }

    #[tokio::test]
    async fn test_append_continues_after_existing_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.append_to_bank(vec![candidate("Q1?"), candidate("Q2?")]).await.unwrap();

        let added = store
            .append_to_bank(vec![candidate("Q3?"), candidate("Q4?"), candidate("Q5?")])
            .await
            .unwrap();

        assert_eq!(added, 3);
        assert_eq!(
            bank_ids(&store).await,
            vec!["diplo_000", "diplo_001", "diplo_002", "diplo_003", "diplo_004"]
        );
    }

    #[tokio::test]
    async fn test_ids_are_strictly_increasing_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        for batch in 1..=4 {
            let questions = (0..batch).map(|i| candidate(&format!("B{batch} Q{i}?"))).collect();
            store.append_to_bank(questions).await.unwrap();
        }

        let numbers: Vec<u64> = store
            .load_bank()
            .await
            .unwrap()
            .iter()
            .map(|q| record_id_number(q).unwrap())
            .collect();
        assert_eq!(numbers, (0..10).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_next_id_uses_max_suffix_not_length() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let existing = vec![BankQuestion::new(candidate("Old A?"), 7), BankQuestion::new(candidate("Old B?"), 3)];
        write_json_file(&existing, store.bank_path()).await.unwrap();

        store.append_to_bank(vec![candidate("New?")]).await.unwrap();
        assert_eq!(bank_ids(&store).await, vec!["diplo_007", "diplo_003", "diplo_008"]);
    }

    #[test]
    fn test_next_bank_number_ignores_odd_ids() {
        let legacy = record(json!({"question": "Odd?", "id": "legacy"}));
        let numbered = record(json!({"question": "Q?", "id": "diplo_041"}));
        let unnumbered = record(json!({"question": "No id?"}));

        assert_eq!(next_bank_number(&[]).unwrap(), 0);
        assert_eq!(next_bank_number(&[legacy.clone()]).unwrap(), 1);
        assert_eq!(next_bank_number(&[unnumbered]).unwrap(), 1);
        assert_eq!(next_bank_number(&[legacy, numbered]).unwrap(), 42);
    }

    #[tokio::test]
    async fn test_exhausted_id_space_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let last = format!("diplo_{}", u64::MAX);
        let near_end = format!("diplo_{}", u64::MAX - 1);

        write_json_file(&json!([{"question": "Last?", "id": last}]), store.bank_path()).await.unwrap();
        let err = store.append_to_bank(vec![candidate("Q?")]).await.unwrap_err();
        assert!(matches!(err, StoreError::IdsExhausted { .. }));

        write_json_file(&json!([{"question": "Almost?", "id": near_end}]), store.bank_path())
            .await
            .unwrap();
        let err = store
            .append_to_bank(vec![candidate("Q1?"), candidate("Q2?")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IdsExhausted { count: 2, .. }));

        assert_eq!(store.append_to_bank(vec![candidate("Q1?")]).await.unwrap(), 1);
        assert_eq!(bank_ids(&store).await[1], format!("diplo_{}", u64::MAX));
    }

    #[tokio::test]
    async fn test_malformed_bank_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        std::fs::write(store.bank_path(), "[{\"question\": ").unwrap();

        let err = store.append_to_bank(vec![candidate("Q?")]).await.unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
        assert_eq!(std::fs::read_to_string(store.bank_path()).unwrap(), "[{\"question\": ");
    }

    #[tokio::test]
    async fn test_bank_of_non_objects_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        std::fs::write(store.bank_path(), "[\"just text\"]").unwrap();

        let err = store.load_bank().await.unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_append_keeps_existing_entries_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let existing = json!([
            {
                "category": "UN & Multilateral Diplomacy",
                "difficulty": "easy",
                "question": "Where does the UN General Assembly meet?",
                "correct_answer": "New York City",
                "incorrect_answers": ["Geneva", "Vienna", "Nairobi"],
                "source": "BBC World",
                "id": "diplo_000",
                "explanation": "keep me"
            },
            {
                "category": "Made Up Category",
                "difficulty": "Medium",
                "question": "Who hosted the 2024 NATO summit?",
                "id": "diplo_001"
            }
        ]);
        write_json_file(&existing, store.bank_path()).await.unwrap();

        store.append_to_bank(vec![candidate("Q?")]).await.unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(store.bank_path()).unwrap()).unwrap();
        let entries = raw.as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], existing[0]);
        assert_eq!(entries[1], existing[1]);
        assert_eq!(entries[2]["id"], "diplo_002");
        assert_eq!(entries[2]["difficulty"], "hard");
    }

    #[tokio::test]
    async fn test_rewrite_keeps_field_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        std::fs::write(store.bank_path(), r#"[{"id": "diplo_000", "question": "First?", "category": "X"}]"#).unwrap();

        store.append_to_bank(vec![candidate("Q?")]).await.unwrap();

        let text = std::fs::read_to_string(store.bank_path()).unwrap();
        let id = text.find("\"diplo_000\"").unwrap();
        let question = text.find("\"First?\"").unwrap();
        let category = text.find("\"X\"").unwrap();
        assert!(id < question && question < category);
    }

    #[tokio::test]
    async fn test_stage_assigns_pending_ids_and_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap();

        store.stage_for_review_at(vec![candidate("P1?")], at).await.unwrap();
        store.stage_for_review_at(vec![candidate("P2?"), candidate("P3?")], at).await.unwrap();

        let pending = store.load_pending().await.unwrap();
        let ids: Vec<&str> = pending.iter().map(|q| q["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["pending_000", "pending_001", "pending_002"]);
        assert_eq!(pending[0]["staged_at"], "2026-03-01T12:30:00.000000+00:00");
        assert!(!store.bank_path().exists(), "staging never touches the bank");
    }

    #[tokio::test]
    async fn test_approve_moves_pending_into_bank() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.append_to_bank(vec![candidate("Existing?")]).await.unwrap();
        store.stage_for_review(vec![candidate("P1?"), candidate("P2?")]).await.unwrap();

        let approved = store.approve_pending().await.unwrap();
        assert_eq!(approved, 2);
        assert!(!store.pending_path().exists());
        assert_eq!(bank_ids(&store).await, vec!["diplo_000", "diplo_001", "diplo_002"]);

        for entry in store.load_bank().await.unwrap() {
            assert!(entry.get("staged_at").is_none());
            assert!(entry["id"].as_str().unwrap().starts_with("diplo_"));
            assert_eq!(entry.keys().last().map(String::as_str), Some("id"));
        }
    }

    #[tokio::test]
    async fn test_approve_keeps_reviewer_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let pending = json!([{
            "question": "Which court sits in The Hague?",
            "id": "pending_000",
            "staged_at": "2026-03-01T12:30:00.000000+00:00",
            "reviewer_note": "checked"
        }]);
        write_json_file(&pending, store.pending_path()).await.unwrap();

        assert_eq!(store.approve_pending().await.unwrap(), 1);

        let bank = store.load_bank().await.unwrap();
        assert_eq!(bank[0]["reviewer_note"], "checked");
        assert_eq!(bank[0]["id"], "diplo_000");
        assert!(bank[0].get("staged_at").is_none());
    }

    #[tokio::test]
    async fn test_approve_twice_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.stage_for_review(vec![candidate("P1?")]).await.unwrap();

        assert_eq!(store.approve_pending().await.unwrap(), 1);
        assert_eq!(store.approve_pending().await.unwrap(), 0);
        assert_eq!(store.load_bank().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_approve_with_empty_pending_file_keeps_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        std::fs::write(store.pending_path(), "[]").unwrap();

        assert_eq!(store.approve_pending().await.unwrap(), 0);
        assert!(!store.bank_path().exists());
    }
}

//! Plain-text console report for a run.
//!
//! Everything here renders to a `String`; `main` decides where it goes.

use crate::models::{CandidateQuestion, Difficulty};
use crate::pipeline::{Approval, Run, RunOutcome, RunReport};
use itertools::Itertools;
use std::fmt::Write;

const RULE_WIDTH: usize = 40;
const PREVIEW_RULE_WIDTH: usize = 60;

/// `easy=N, medium=N, hard=N` for a batch.
pub fn difficulty_mix(questions: &[CandidateQuestion]) -> String {
    let counts = questions.iter().map(|q| q.difficulty).counts();
    Difficulty::ALL
        .iter()
        .map(|d| format!("{d}={}", counts.get(d).copied().unwrap_or(0)))
        .join(", ")
}

/// Every question that a dry run would have written.
pub fn render_preview(questions: &[CandidateQuestion]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nDRY RUN: would add {} questions:", questions.len());
    let _ = writeln!(out, "{}", "-".repeat(PREVIEW_RULE_WIDTH));

    for (i, q) in questions.iter().enumerate() {
        let _ = writeln!(out, "\n  [{}] ({}) {}", i + 1, q.difficulty, q.category);
        let _ = writeln!(out, "      Q: {}", q.question);
        let _ = writeln!(out, "      A: {}", q.correct_answer);
        let _ = writeln!(out, "      Wrong: {}", q.incorrect_answers.join(", "));
        let _ = writeln!(out, "      Source: {}", q.source);
    }

    let _ = writeln!(out, "\nDifficulty mix: {}", difficulty_mix(questions));
    let _ = writeln!(out, "\nDry run complete. No files were modified.");
    out
}

/// Step-by-step summary of a run, ending at the stage where it stopped.
pub fn render_run(run: &Run) -> String {
    let report = &run.report;
    let mut out = String::new();
    let _ = writeln!(out, "\nBrainBurst question refresh");
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));

    if let Some(stop) = steps(&mut out, report, &run.outcome) {
        let _ = writeln!(out, "Stopped: {stop}");
        return out;
    }

    match &run.outcome {
        RunOutcome::Previewed(questions) => out.push_str(&render_preview(questions)),
        RunOutcome::Staged {
            staged,
            pending_total,
            path,
        } => {
            let _ = writeln!(out, "\nStaged {staged} questions for review.");
            let _ = writeln!(out, "   Total pending: {pending_total}");
            let _ = writeln!(out, "   Review: {}", path.display());
            let _ = writeln!(out, "   Approve: {} --approve", env!("CARGO_PKG_NAME"));
        }
        RunOutcome::Committed {
            added,
            bank_total,
            path,
        } => {
            let _ = writeln!(out, "\nAdded {added} new questions to {}", path.display());
            let _ = writeln!(out, "   Total questions: {bank_total}");
        }
        _ => {}
    }

    let _ = writeln!(out, "\n{}", "=".repeat(RULE_WIDTH));
    let _ = writeln!(out, "Pipeline complete.");
    out
}

/// Write the step lines; returns the diagnostic if the run stopped early.
fn steps(out: &mut String, report: &RunReport, outcome: &RunOutcome) -> Option<&'static str> {
    let _ = writeln!(out, "\nStep 1: Fetching diplomatic news...");
    if *outcome == RunOutcome::NoNews {
        return Some("no news items fetched. Check your internet connection.");
    }
    let _ = writeln!(out, "   {} news items from {} feeds", report.news, report.feeds);

    let _ = writeln!(out, "\nStep 2: Generating {} questions...", report.requested);
    if *outcome == RunOutcome::NoneGenerated {
        return Some("no questions generated. Check the API key and try again.");
    }
    let _ = writeln!(out, "   {} raw questions generated", report.generated);

    let _ = writeln!(out, "\nStep 3: Validating questions...");
    if report.rejected > 0 {
        let _ = writeln!(out, "   {} questions failed validation", report.rejected);
    }
    let _ = writeln!(out, "   {} questions passed validation", report.valid);
    if *outcome == RunOutcome::NoneValid {
        return Some("no valid questions after validation. Try again.");
    }

    let _ = writeln!(out, "\nStep 4: Deduplicating against existing questions...");
    if report.duplicates > 0 {
        let _ = writeln!(out, "   {} duplicates removed", report.duplicates);
    }
    let _ = writeln!(out, "   {} unique new questions", report.unique);
    if *outcome == RunOutcome::NoneUnique {
        return Some("all questions were duplicates. Try again for fresh content.");
    }

    let _ = writeln!(out, "\nStep 5: Writing results...");
    None
}

pub fn render_approval(approval: &Approval) -> String {
    if approval.approved == 0 {
        return "\nNo pending questions to approve.\n".to_string();
    }
    format!(
        "\nApproved {} questions. Total now: {}\n",
        approval.approved, approval.bank_total
    )
}

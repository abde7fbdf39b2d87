//! Question generation from news items.
//!
//! The model's reply is untrusted text. [`decode_candidates`] is the only way
//! it enters the pipeline: an optional code fence is removed, the rest must
//! parse as a JSON array, and each element is kept as a raw
//! `serde_json::Value` for the validator to police. Any failure yields an
//! empty batch; a partially decoded batch is never returned.

use crate::api::{AskAsync, Prompt};
use crate::models::{NewsItem, VALID_CATEGORIES};
use crate::utils::{looks_truncated, truncate_for_log};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt::Write;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

/// Most news items embedded in one request.
pub const MAX_CONTEXT_ITEMS: usize = 15;

/// Characters of a bad response kept in the log.
const LOG_EXCERPT_CHARS: usize = 1000;

static OPENING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[A-Za-z0-9_+-]*[ \t]*\r?\n?").expect("valid fence regex"));
static CLOSING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r?\n?```\s*$").expect("valid fence regex"));

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("response is not valid JSON (truncated: {truncated}): {source}")]
    InvalidJson {
        source: serde_json::Error,
        truncated: bool,
    },

    #[error("expected a JSON array, got {found}")]
    NotAnArray { found: &'static str },
}

/// Remove a leading and trailing code fence (with optional language tag).
///
/// Text that does not start with a fence is returned trimmed but otherwise
/// untouched.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let body = match OPENING_FENCE.find(trimmed) {
        Some(m) => &trimmed[m.end()..],
        None => trimmed,
    };
    match CLOSING_FENCE.find(body) {
        Some(m) => &body[..m.start()],
        None => body,
    }
}

/// Decode a model reply into raw candidate records.
pub fn decode_candidates(raw: &str) -> Result<Vec<Value>, DecodeError> {
    let body = strip_code_fence(raw);
    let value: Value = serde_json::from_str(body).map_err(|source| DecodeError::InvalidJson {
        truncated: looks_truncated(&source),
        source,
    })?;
    match value {
        Value::Array(items) => Ok(items),
        other => Err(DecodeError::NotAnArray {
            found: json_kind(&other),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// System instructions: role, accuracy rules, difficulty mix, category list.
pub fn system_prompt() -> String {
    let mut prompt = String::from(
        "You are an expert trivia question generator specializing in diplomacy, geopolitics, and international relations.\n\n\
         You create challenging, educational multiple-choice trivia questions based on real news events. Your questions should:\n\
         - Be factually accurate and based on the provided news items\n\
         - Have exactly ONE correct answer and exactly THREE plausible but incorrect answers\n\
         - Cover a range of difficulties (easy, medium, hard)\n\
         - Be assigned to one of the existing categories when possible\n\n\
         Target difficulty distribution: ~30% easy, ~35% medium, ~35% hard\n\n\
         Available categories:\n",
    );
    for category in VALID_CATEGORIES {
        let _ = writeln!(prompt, "- {category}");
    }
    prompt.push_str(
        "\nIf a question doesn't fit any existing category, use the closest match.\n\n\
         IMPORTANT: Return ONLY valid JSON. No markdown fences, no commentary.",
    );
    prompt
}

/// Numbered news block for the user message.
fn news_block(news: &[NewsItem]) -> String {
    news.iter()
        .enumerate()
        .map(|(i, item)| format!("[{}] {} ({})\n{}", i + 1, item.title, item.source, item.summary))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// User message asking for exactly `count` questions about `news`.
pub fn user_prompt(news: &[NewsItem], count: usize) -> String {
    format!(
        r#"Based on these recent diplomatic/geopolitical news items, generate exactly {count} trivia questions.

NEWS ITEMS:
{news}

Return a JSON array of objects with this EXACT schema:
[
  {{
    "category": "one of the listed categories",
    "difficulty": "easy" | "medium" | "hard",
    "question": "the trivia question text",
    "correct_answer": "the correct answer",
    "incorrect_answers": ["wrong1", "wrong2", "wrong3"],
    "source": "brief citation of the news event / source"
  }}
]

Requirements:
- Exactly {count} questions
- Exactly 3 incorrect_answers per question
- Each question must cite which news event it's based on in the source field
- Mix difficulties: ~30% easy, ~35% medium, ~35% hard
- Questions should test knowledge of the EVENT, not just reading comprehension
- Make incorrect answers plausible; avoid obviously silly options

Return ONLY the JSON array, nothing else."#,
        news = news_block(news),
    )
}

/// Build the request for `count` questions from the first
/// [`MAX_CONTEXT_ITEMS`] news items.
pub fn build_prompt(news: &[NewsItem], count: usize) -> Prompt {
    let selected = &news[..news.len().min(MAX_CONTEXT_ITEMS)];
    Prompt {
        system: system_prompt(),
        user: user_prompt(selected, count),
    }
}

/// Ask the model for `count` questions about `news`.
///
/// Fails closed: transport errors, unparseable replies and non-array replies
/// all produce an empty vector.
#[instrument(level = "info", skip_all, fields(news = news.len(), count = count))]
pub async fn generate<A>(asker: &A, news: &[NewsItem], count: usize) -> Vec<Value>
where
    A: AskAsync<Response = String>,
{
    if news.is_empty() {
        error!("No news items available to generate questions from");
        return Vec::new();
    }

    let prompt = build_prompt(news, count);
    info!(
        news_items = news.len().min(MAX_CONTEXT_ITEMS),
        requested = count,
        "Sending news items to the model"
    );

    let raw = match asker.ask(&prompt).await {
        Ok(raw) => raw,
        Err(e) => {
            error!(error = %e, "Model request failed");
            return Vec::new();
        }
    };
    debug!(bytes = raw.len(), "Model replied");

    match decode_candidates(&raw) {
        Ok(candidates) => {
            info!(count = candidates.len(), "Model returned candidate questions");
            if candidates.len() != count {
                warn!(requested = count, returned = candidates.len(), "Model returned a different number of questions");
            }
            candidates
        }
        Err(e) => {
            error!(
                error = %e,
                response_preview = %truncate_for_log(&raw, LOG_EXCERPT_CHARS),
                "Failed to decode model response"
            );
            Vec::new()
        }
    }
}

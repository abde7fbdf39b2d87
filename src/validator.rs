//! Schema validation for generated questions.
//!
//! [`validate`] is pure: it turns raw model records into
//! [`CandidateQuestion`]s or rejections, and never touches the network or
//! disk. Every problem with a record is collected so the rejection explains
//! the full diagnosis, not just the first error.
//!
//! The category list is advisory. A record with an unknown category is
//! accepted and only logged.

use crate::models::{CandidateQuestion, Difficulty};
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

/// Fields every record must carry, in wire order.
pub const REQUIRED_FIELDS: [&str; 6] = [
    "category",
    "difficulty",
    "question",
    "correct_answer",
    "incorrect_answers",
    "source",
];

/// A record that failed validation, with every reason found.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// Position of the record in the generated batch.
    pub index: usize,
    pub record: Value,
    pub reasons: Vec<String>,
}

/// Outcome of validating one batch.
#[derive(Debug, Default)]
pub struct Validation {
    /// Accepted questions, in input order.
    pub accepted: Vec<CandidateQuestion>,
    pub rejected: Vec<Rejection>,
}

/// Validate a batch of raw records.
#[instrument(level = "info", skip_all, fields(count = records.len()))]
pub fn validate(records: Vec<Value>) -> Validation {
    let mut validation = Validation::default();

    for (index, record) in records.into_iter().enumerate() {
        match check_record(&record) {
            Ok(question) => {
                if !question.has_known_category() {
                    warn!(
                        index,
                        category = %question.category,
                        "Category not in standard list (keeping it)"
                    );
                }
                validation.accepted.push(question);
            }
            Err(reasons) => {
                warn!(index, reasons = %reasons.join("; "), "Invalid question");
                validation.rejected.push(Rejection {
                    index,
                    record,
                    reasons,
                });
            }
        }
    }

    info!(
        valid = validation.accepted.len(),
        invalid = validation.rejected.len(),
        "Validation complete"
    );
    validation
}

/// Build a [`CandidateQuestion`] from one record or list everything wrong with it.
pub fn check_record(record: &Value) -> Result<CandidateQuestion, Vec<String>> {
    let Some(fields) = record.as_object() else {
        return Err(vec!["record is not a JSON object".to_string()]);
    };
    let mut reasons = Vec::new();

    let category = text_field(fields, "category", &mut reasons);
    let question = text_field(fields, "question", &mut reasons);
    let correct_answer = text_field(fields, "correct_answer", &mut reasons);
    let source = text_field(fields, "source", &mut reasons);

    let difficulty = text_field(fields, "difficulty", &mut reasons).and_then(|label| {
        let parsed = Difficulty::parse(label);
        if parsed.is_none() {
            reasons.push(format!("invalid difficulty: {label}"));
        }
        parsed
    });

    let incorrect_answers = incorrect_answers(fields, &mut reasons);

    match (category, difficulty, question, correct_answer, incorrect_answers, source) {
        (
            Some(category),
            Some(difficulty),
            Some(question),
            Some(correct_answer),
            Some(incorrect_answers),
            Some(source),
        ) if reasons.is_empty() => Ok(CandidateQuestion {
            category: category.to_string(),
            difficulty,
            question: question.to_string(),
            correct_answer: correct_answer.to_string(),
            incorrect_answers,
            source: source.to_string(),
        }),
        _ => Err(reasons),
    }
}

/// A required string field that is non-blank after trimming.
fn text_field<'a>(
    fields: &'a Map<String, Value>,
    name: &str,
    reasons: &mut Vec<String>,
) -> Option<&'a str> {
    match fields.get(name) {
        None | Some(Value::Null) => {
            reasons.push(format!("missing or empty field: {name}"));
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            reasons.push(format!("missing or empty field: {name}"));
            None
        }
        Some(Value::String(s)) => Some(s),
        Some(_) => {
            reasons.push(format!("field {name} must be a string"));
            None
        }
    }
}

fn incorrect_answers(fields: &Map<String, Value>, reasons: &mut Vec<String>) -> Option<[String; 3]> {
    let answers = match fields.get("incorrect_answers") {
        None | Some(Value::Null) => {
            reasons.push("missing or empty field: incorrect_answers".to_string());
            return None;
        }
        Some(Value::Array(answers)) if answers.is_empty() => {
            reasons.push("missing or empty field: incorrect_answers".to_string());
            return None;
        }
        Some(Value::Array(answers)) => answers,
        Some(_) => {
            reasons.push("incorrect_answers must be a list".to_string());
            return None;
        }
    };

    let before = reasons.len();
    if answers.len() != 3 {
        reasons.push(format!(
            "need exactly 3 incorrect_answers, got {}",
            answers.len()
        ));
    }

    let mut texts = Vec::with_capacity(answers.len());
    for (j, answer) in answers.iter().enumerate() {
        match answer.as_str() {
            Some(s) if !s.trim().is_empty() => texts.push(s.to_string()),
            Some(_) => reasons.push(format!("incorrect_answers[{j}] is empty")),
            None => reasons.push(format!("incorrect_answers[{j}] must be a string")),
        }
    }

    if reasons.len() != before {
        return None;
    }
    texts.try_into().ok()
}

//! Language model access with exponential backoff retry logic.
//!
//! # Architecture
//!
//! - [`AskAsync`]: core trait, one prompt in, one response out
//! - [`MessagesClient`]: calls the Anthropic Messages API over `reqwest`
//! - [`RetryAsk`]: decorator that adds retry logic to any `AskAsync` implementation
//!
//! # Retry Strategy
//!
//! - Configurable number of retries (0 disables retrying)
//! - Exponential backoff from a configurable base delay
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to each delay

use rand::{Rng, rng};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("ANTHROPIC_API_KEY environment variable is not set")]
    MissingCredential,

    #[error("model response contained no text block")]
    EmptyResponse,
}

/// A system instruction plus one user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Trait for async language model interaction.
///
/// Implementors send a [`Prompt`] and return the model's reply. Decorators
/// such as [`RetryAsk`] wrap another implementation.
pub trait AskAsync {
    /// The type of response returned by the model.
    type Response;

    async fn ask(&self, prompt: &Prompt) -> Result<Self::Response, Box<dyn Error>>;
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    /// The underlying client to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    fn backoff(&self, attempt: usize) -> StdDuration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + StdDuration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync + fmt::Debug,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, prompt: &Prompt) -> Result<Self::Response, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(prompt).await {
                Ok(resp) => {
                    return Ok(resp);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis(),
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Client for the Anthropic Messages API.
pub struct MessagesClient {
    http: Client,
    api_key: String,
    api_base: String,
    model: String,
    max_tokens: u32,
}

impl fmt::Debug for MessagesClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagesClient")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl MessagesClient {
    pub fn new(
        api_key: String,
        api_base: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        timeout: StdDuration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key,
            api_base: api_base.into(),
            model: model.into(),
            max_tokens,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.api_base.trim_end_matches('/'))
    }
}

impl AskAsync for MessagesClient {
    type Response = String;

    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn ask(&self, prompt: &Prompt) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: &prompt.system,
            messages: [Message {
                role: "user",
                content: &prompt.user,
            }],
        };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                elapsed_ms = t0.elapsed().as_millis(),
                %status,
                body = %crate::utils::truncate_for_log(&body, 300),
                "API call failed"
            );
            return Err(format!("Messages API returned {status}").into());
        }

        let parsed: MessagesResponse = response.json().await?;
        let text = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .find_map(|block| block.text)
            .ok_or(ApiError::EmptyResponse)?;

        debug!(elapsed_ms = t0.elapsed().as_millis(), bytes = text.len(), "API call succeeded");
        Ok(text)
    }
}

/// Accept a credential only if it is present and not blank.
pub fn require_api_key(key: Option<String>) -> Result<String, ApiError> {
    key.filter(|key| !key.trim().is_empty())
        .ok_or(ApiError::MissingCredential)
}

/// Build the production client stack: [`MessagesClient`] wrapped in [`RetryAsk`].
#[instrument(level = "info", skip(api_key))]
pub fn messages_client_with_backoff(
    api_key: String,
    api_base: &str,
    model: &str,
    max_tokens: u32,
    timeout: StdDuration,
    max_retries: usize,
    base_delay: StdDuration,
) -> Result<RetryAsk<MessagesClient>, reqwest::Error> {
    let client = MessagesClient::new(api_key, api_base, model, max_tokens, timeout)?;
    info!(max_retries, "Messages client ready");
    Ok(RetryAsk::new(client, max_retries, base_delay))
}

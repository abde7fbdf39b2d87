//! News sources for question generation.
//!
//! A [`NewsSource`] polls each configured feed in turn and normalizes the
//! entries into [`NewsItem`]s. Retrieval goes through the [`FeedFetcher`]
//! trait so the HTTP transport can be swapped out in tests.
//!
//! # Failure handling
//!
//! A feed that cannot be fetched or parsed is logged and skipped; the other
//! feeds still contribute. The result is empty only when every feed failed or
//! returned nothing, and callers treat that as a hard stop.

pub mod rss;

use crate::config::FeedConfig;
use crate::models::NewsItem;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Retrieves the raw document behind a feed url.
pub trait FeedFetcher {
    async fn fetch_feed(&self, url: &str) -> Result<String, Box<dyn Error>>;
}

/// [`FeedFetcher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFeedFetcher {
    client: Client,
}

impl HttpFeedFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl FeedFetcher for HttpFeedFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_feed(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        debug!(bytes = body.len(), "Downloaded feed");
        Ok(body)
    }
}

/// The configured feeds plus the transport used to read them.
#[derive(Debug)]
pub struct NewsSource<F> {
    feeds: Vec<FeedConfig>,
    fetcher: F,
}

impl<F> NewsSource<F>
where
    F: FeedFetcher,
{
    pub fn new(feeds: Vec<FeedConfig>, fetcher: F) -> Self {
        Self { feeds, fetcher }
    }

    pub fn feed_count(&self) -> usize {
        self.feeds.len()
    }

    /// Fetch up to `limit_per_feed` items from every feed.
    ///
    /// Items keep feed order, then entry order within a feed.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch(&self, limit_per_feed: usize) -> Vec<NewsItem> {
        let per_feed: Vec<Vec<NewsItem>> = stream::iter(self.feeds.iter())
            .then(|feed| async move {
                info!(feed = %feed.name, "Fetching RSS");
                match self.fetch_one(feed, limit_per_feed).await {
                    Ok(items) => {
                        info!(feed = %feed.name, count = items.len(), "Fetched feed items");
                        items
                    }
                    Err(e) => {
                        warn!(feed = %feed.name, url = %feed.url, error = %e, "Feed failed; skipping");
                        Vec::new()
                    }
                }
            })
            .collect()
            .await;

        let items: Vec<NewsItem> = per_feed.into_iter().flatten().collect();
        info!(count = items.len(), feeds = self.feeds.len(), "Total news items fetched");
        items
    }

    async fn fetch_one(
        &self,
        feed: &FeedConfig,
        limit: usize,
    ) -> Result<Vec<NewsItem>, Box<dyn Error>> {
        let document = self.fetcher.fetch_feed(&feed.url).await?;
        let items = rss::parse_feed(&document)?
            .into_iter()
            .take(limit)
            .filter_map(|entry| entry.into_news_item(&feed.name))
            .collect();
        Ok(items)
    }
}

//! Pipeline configuration.
//!
//! Every setting has a default, so the pipeline runs without a config file.
//! An optional YAML file passed with `--config` overrides any subset:
//!
//! ```yaml
//! bank_file: data/diplomacy_questions.json
//! model: claude-sonnet-4-5-20250929
//! max_retries: 3
//! feeds:
//!   - name: BBC World
//!     url: https://feeds.bbci.co.uk/news/world/rss.xml
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("feed '{name}' has an invalid url '{url}': {source}")]
    InvalidFeedUrl {
        name: String,
        url: String,
        source: url::ParseError,
    },

    #[error("no feeds configured")]
    NoFeeds,
}

/// One RSS/Atom feed and the label attached to its items.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
}

impl FeedConfig {
    fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

/// Settings for one pipeline invocation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Feeds polled in order.
    pub feeds: Vec<FeedConfig>,
    /// Committed question bank.
    pub bank_file: PathBuf,
    /// Questions staged for review.
    pub pending_file: PathBuf,
    /// Entries taken from each feed.
    pub max_per_feed: usize,
    /// Messages API base URL.
    pub api_base: String,
    pub model: String,
    pub max_tokens: u32,
    /// Retries after a failed generation request. 0 disables retrying.
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            feeds: default_feeds(),
            bank_file: PathBuf::from("diplomacy_questions.json"),
            pending_file: PathBuf::from("pending_questions.json"),
            max_per_feed: 10,
            api_base: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-5-20250929".to_string(),
            max_tokens: 4096,
            max_retries: 2,
            retry_base_delay_ms: 1000,
            request_timeout_secs: 120,
        }
    }
}

fn default_feeds() -> Vec<FeedConfig> {
    vec![
        FeedConfig::new("Reuters World", "https://feeds.reuters.com/Reuters/worldNews"),
        FeedConfig::new("BBC World", "https://feeds.bbci.co.uk/news/world/rss.xml"),
        FeedConfig::new("Al Jazeera", "https://www.aljazeera.com/xml/rss/all.xml"),
        FeedConfig::new("The Guardian World", "https://www.theguardian.com/world/rss"),
        FeedConfig::new("AP News World", "https://rsshub.app/apnews/topics/world-news"),
    ]
}

impl PipelineConfig {
    /// Load the config from `path`, or the defaults when no path is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            None => {
                debug!("No config file given; using defaults");
                Self::default()
            }
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                let config = Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?;
                info!(path = %path.display(), "Loaded configuration");
                config
            }
        };
        config.check_feeds()?;
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    fn check_feeds(&self) -> Result<(), ConfigError> {
        if self.feeds.is_empty() {
            return Err(ConfigError::NoFeeds);
        }
        for feed in &self.feeds {
            Url::parse(&feed.url).map_err(|source| ConfigError::InvalidFeedUrl {
                name: feed.name.clone(),
                url: feed.url.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::load(None).unwrap();
        assert_eq!(config.feeds.len(), 5);
        assert_eq!(config.feeds[1].name, "BBC World");
        assert_eq!(config.max_per_feed, 10);
        assert_eq!(config.bank_file, PathBuf::from("diplomacy_questions.json"));
        assert_eq!(config.pending_file, PathBuf::from("pending_questions.json"));
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let config = PipelineConfig::from_yaml("model: test-model\nmax_retries: 0\n").unwrap();
        assert_eq!(config.model, "test-model");
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.feeds.len(), 5);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "bank_file: /tmp/bank.json\nfeeds:\n  - name: Local\n    url: http://localhost:8080/rss.xml"
        )
        .unwrap();

        let config = PipelineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.bank_file, PathBuf::from("/tmp/bank.json"));
        assert_eq!(config.feeds, vec![FeedConfig::new("Local", "http://localhost:8080/rss.xml")]);
    }

    #[test]
    fn test_invalid_feed_url_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "feeds:\n  - name: Broken\n    url: not a url").unwrap();

        let err = PipelineConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFeedUrl { ref name, .. } if name == "Broken"));
    }

    #[test]
    fn test_empty_feed_list_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "feeds: []").unwrap();

        let err = PipelineConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::NoFeeds));
    }

    #[test]
    fn test_missing_file() {
        let err = PipelineConfig::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}

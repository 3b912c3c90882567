use crate::index::IndexChecker;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use wdf_scanner::crawler::{DEFAULT_PAGE_LIMIT, MAX_CRAWL_DEPTH};
use wdf_scanner::probe::DEFAULT_MAX_SNIPPET;

pub const DEFAULT_CONCURRENCY: usize = 20;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_USER_AGENT: &str = "wdf (defensive exposure scanner)";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("concurrency must be greater than 0")]
    ZeroConcurrency,

    #[error("timeout must be greater than 0")]
    ZeroTimeout,

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Everything a scan needs besides its targets and rules.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_snippet: usize,
    pub enable_robots: bool,
    pub enable_sitemap: bool,
    pub enable_crawl: bool,
    pub crawl_depth: usize,
    pub crawl_limit: usize,
    #[serde(skip)]
    pub index_checker: Option<Arc<dyn IndexChecker>>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_snippet: DEFAULT_MAX_SNIPPET,
            enable_robots: false,
            enable_sitemap: false,
            enable_crawl: false,
            crawl_depth: MAX_CRAWL_DEPTH,
            crawl_limit: DEFAULT_PAGE_LIMIT,
            index_checker: None,
        }
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("concurrency", &self.concurrency)
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_snippet", &self.max_snippet)
            .field("enable_robots", &self.enable_robots)
            .field("enable_sitemap", &self.enable_sitemap)
            .field("enable_crawl", &self.enable_crawl)
            .field("crawl_depth", &self.crawl_depth)
            .field("crawl_limit", &self.crawl_limit)
            .field("index_checker", &self.index_checker.is_some())
            .finish()
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Crawl depth actually used: 0 means the default, never deeper than 2.
    pub fn effective_crawl_depth(&self) -> usize {
        if self.crawl_depth == 0 {
            MAX_CRAWL_DEPTH
        } else {
            self.crawl_depth.min(MAX_CRAWL_DEPTH)
        }
    }

    pub fn effective_crawl_limit(&self) -> usize {
        if self.crawl_limit == 0 {
            DEFAULT_PAGE_LIMIT
        } else {
            self.crawl_limit
        }
    }

    pub fn with_index_checker(mut self, checker: Arc<dyn IndexChecker>) -> Self {
        self.index_checker = Some(checker);
        self
    }
}

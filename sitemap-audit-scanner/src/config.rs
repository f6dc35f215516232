use crate::error::{Result, ScanError};
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str =
    concat!("sitemap-audit/", env!("CARGO_PKG_VERSION"), " (+https://www.sitemaps.org)");

/// Tunables for a single traversal.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Maximum number of fetches in flight at once.
    pub concurrency: usize,
    /// Deepest level a node may sit at. The root is depth 0.
    pub max_depth: usize,
    /// Total number of distinct locations the crawl may claim, root included.
    pub max_nodes: usize,
    pub request_timeout: Duration,
    /// Cancels the traversal once elapsed and returns a partial report.
    pub crawl_timeout: Option<Duration>,
    pub user_agent: String,
    pub max_body_bytes: usize,
    /// Retry leaf probes with GET when a server rejects HEAD.
    pub head_fallback_get: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            max_depth: 8,
            max_nodes: 100_000,
            request_timeout: Duration::from_secs(10),
            crawl_timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            // sitemaps.org caps an uncompressed sitemap at 50 MiB
            max_body_bytes: 50 * 1024 * 1024,
            head_fallback_get: true,
        }
    }
}

impl CrawlConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_nodes(mut self, nodes: usize) -> Self {
        self.max_nodes = nodes;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_crawl_timeout(mut self, timeout: Duration) -> Self {
        self.crawl_timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    pub fn with_head_fallback_get(mut self, enabled: bool) -> Self {
        self.head_fallback_get = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(ScanError::InvalidConfig(
                "concurrency limit must be at least 1".to_string(),
            ));
        }
        if self.max_nodes == 0 {
            return Err(ScanError::InvalidConfig(
                "max node count must be at least 1".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ScanError::InvalidConfig(
                "request timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

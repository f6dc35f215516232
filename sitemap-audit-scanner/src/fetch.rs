use crate::config::CrawlConfig;
use crate::error::{FetchError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, redirect};
use std::time::Duration;
use tracing::debug;

/// A full response body together with its status.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub status_code: u16,
    pub bytes: Vec<u8>,
}

impl FetchedBody {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn has_body(&self) -> bool {
        !self.bytes.is_empty()
    }
}

/// Network access used by the traversal engine.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Retrieves a sitemap document. Non-2xx responses are returned, not errors.
    async fn fetch_body(&self, url: &str) -> std::result::Result<FetchedBody, FetchError>;

    /// Probes a page for its status without following redirects.
    async fn fetch_head_only(&self, url: &str) -> std::result::Result<u16, FetchError>;
}

/// `reqwest` backed fetcher.
pub struct HttpFetcher {
    documents: Client,
    probes: Client,
    max_body_bytes: usize,
    head_fallback_get: bool,
}

impl HttpFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        Ok(Self {
            documents: Self::client(config, redirect::Policy::limited(5))?,
            probes: Self::client(config, redirect::Policy::none())?,
            max_body_bytes: config.max_body_bytes,
            head_fallback_get: config.head_fallback_get,
        })
    }

    fn client(config: &CrawlConfig, policy: redirect::Policy) -> Result<Client> {
        let connect_timeout = (config.request_timeout / 2).max(Duration::from_millis(100));
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(50) // Connection pooling
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(policy)
            .build()?;
        Ok(client)
    }

    fn check_length(&self, declared: Option<u64>) -> std::result::Result<(), FetchError> {
        match declared {
            Some(length) if length > self.max_body_bytes as u64 => Err(FetchError::BodyTooLarge {
                limit: self.max_body_bytes,
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_body(&self, url: &str) -> std::result::Result<FetchedBody, FetchError> {
        debug!("GET {}", url);
        let mut response = self.documents.get(url).send().await?;
        let status_code = response.status().as_u16();
        self.check_length(response.content_length())?;

        // Chunked and decompressed bodies carry no usable length, so the
        // limit is enforced while reading.
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if bytes.len() + chunk.len() > self.max_body_bytes {
                return Err(FetchError::BodyTooLarge {
                    limit: self.max_body_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedBody { status_code, bytes })
    }

    async fn fetch_head_only(&self, url: &str) -> std::result::Result<u16, FetchError> {
        debug!("HEAD {}", url);
        let status = self.probes.head(url).send().await?.status();

        let rejected = status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_IMPLEMENTED;
        if rejected && self.head_fallback_get {
            debug!("HEAD rejected with {} for {}, retrying with GET", status, url);
            let response = self.probes.get(url).send().await?;
            return Ok(response.status().as_u16());
        }

        Ok(status.as_u16())
    }
}

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that abort a whole crawl invocation.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Report already finalized, refusing to record {0}")]
    ReportFinalized(String),

    #[error("Result for {0} was already recorded")]
    DuplicateResult(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// A fetch that could not produce a status code.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("too many redirects: {0}")]
    Redirect(String),

    #[error("failed to read body: {0}")]
    Body(String),

    #[error("body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("invalid location: {0}")]
    InvalidLocation(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("cancelled before completion")]
    Cancelled,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        let detail = err.to_string();
        if err.is_timeout() {
            FetchError::Timeout(detail)
        } else if err.is_connect() {
            FetchError::Connect(detail)
        } else if err.is_redirect() {
            FetchError::Redirect(detail)
        } else if err.is_body() || err.is_decode() {
            FetchError::Body(detail)
        } else {
            FetchError::Request(detail)
        }
    }
}

/// A body that was fetched but is not a sitemap document.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DecodeError {
    #[error("body is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("no root element")]
    MissingRoot,

    #[error("unexpected root element <{0}>")]
    UnrecognizedRoot(String),
}

/// Expansion stopped early by a guard or by cancellation. Informational,
/// never fatal.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "guard", rename_all = "snake_case")]
pub enum Truncation {
    #[error("children would exceed max depth {limit}")]
    MaxDepth { limit: usize },

    #[error("node budget of {limit} exhausted")]
    MaxNodes { limit: usize },

    #[error("cancelled with {remaining} entries not dispatched")]
    Cancelled { remaining: usize },
}

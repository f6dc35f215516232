pub mod aggregate;
pub mod config;
pub mod crawler;
pub mod decode;
pub mod error;
pub mod fetch;
pub mod node;
pub mod result;
pub mod tracker;

pub use aggregate::ResultAggregator;
pub use config::CrawlConfig;
pub use crawler::{Crawler, ProgressCallback, traverse};
pub use decode::{IndexEntry, SitemapDecoder, SitemapDocument, UrlEntry};
pub use error::{DecodeError, FetchError, ScanError, Truncation};
pub use fetch::{FetchedBody, Fetcher, HttpFetcher};
pub use node::{EntryMetadata, NodeKind, SitemapNode};
pub use result::{Backreference, CrawlReport, CrawlStatus, FetchOutcome, ReportRow, VisitResult};
pub use tracker::{WorkGuard, WorkTracker};

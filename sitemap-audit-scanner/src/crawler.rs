use crate::aggregate::ResultAggregator;
use crate::config::CrawlConfig;
use crate::decode::{SitemapDecoder, SitemapDocument};
use crate::error::{DecodeError, FetchError, Result, ScanError, Truncation};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::node::{EntryMetadata, NodeKind, SitemapNode};
use crate::result::{Backreference, CrawlReport, CrawlStatus, FetchOutcome, VisitResult};
use crate::tracker::WorkTracker;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// Invoked with every result as soon as it is recorded.
pub type ProgressCallback = Arc<dyn Fn(&VisitResult) + Send + Sync>;

/// Walks a sitemap tree and records the status of every location in it.
pub struct Crawler {
    fetcher: Arc<dyn Fetcher>,
    decoder: SitemapDecoder,
    config: CrawlConfig,
    progress_callback: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl Crawler {
    /// Builds a crawler backed by [`HttpFetcher`].
    pub fn new(config: CrawlConfig) -> Result<Self> {
        config.validate()?;
        let fetcher = Arc::new(HttpFetcher::new(&config)?);
        Self::with_fetcher(config, fetcher)
    }

    pub fn with_fetcher(config: CrawlConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            fetcher,
            decoder: SitemapDecoder::new(),
            config,
            progress_callback: None,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Cancelling this token stops every traversal started by this crawler.
    /// Results collected so far are still returned.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolves the whole tree below `root_location`.
    ///
    /// Only configuration problems (a bad root URL) are returned as errors.
    /// Everything that goes wrong per node ends up in that node's
    /// [`VisitResult`].
    pub async fn traverse(&self, root_location: &str) -> Result<CrawlReport> {
        let root = normalize_root(root_location)?;
        info!(
            "Starting sitemap traversal of {} with concurrency {}",
            root, self.config.concurrency
        );

        let cancel = self.cancel.child_token();
        let traversal = Arc::new(Traversal {
            fetcher: self.fetcher.clone(),
            decoder: self.decoder,
            max_depth: self.config.max_depth,
            max_nodes: self.config.max_nodes,
            slots: Semaphore::new(self.config.concurrency),
            frontier: Mutex::new(Frontier::seeded(&root)),
            aggregator: ResultAggregator::new(),
            tracker: WorkTracker::new(),
            cancel: cancel.clone(),
            progress_callback: self.progress_callback.clone(),
        });

        traversal.dispatch(SitemapNode::root(root));

        let timed_out = match self.config.crawl_timeout {
            Some(limit) => tokio::time::timeout(limit, traversal.tracker.wait_idle())
                .await
                .is_err(),
            None => {
                traversal.tracker.wait_idle().await;
                false
            }
        };

        if timed_out {
            warn!("Crawl timeout reached, cancelling outstanding work");
            cancel.cancel();
            traversal.tracker.wait_idle().await;
        }

        let status = if timed_out {
            CrawlStatus::TimedOut
        } else if cancel.is_cancelled() {
            CrawlStatus::Cancelled
        } else {
            CrawlStatus::Completed
        };

        let report = traversal.aggregator.finalize(status).await?;
        info!(
            "Traversal {:?}. Visited {} locations, {} backreferences",
            report.status,
            report.len(),
            report.backreferences.len()
        );
        Ok(report)
    }
}

/// Traverses `root_location` over HTTP with default limits.
pub async fn traverse(root_location: &str, concurrency_limit: usize) -> Result<CrawlReport> {
    let config = CrawlConfig::default().with_concurrency(concurrency_limit);
    Crawler::new(config)?.traverse(root_location).await
}

/// State shared by every unit of one traversal.
struct Traversal {
    fetcher: Arc<dyn Fetcher>,
    decoder: SitemapDecoder,
    max_depth: usize,
    max_nodes: usize,
    slots: Semaphore,
    frontier: Mutex<Frontier>,
    aggregator: ResultAggregator,
    tracker: WorkTracker,
    cancel: CancellationToken,
    progress_callback: Option<ProgressCallback>,
}

/// Locations claimed so far. Claiming is the single atomic
/// check-and-insert that decides which parent gets to fetch a child.
struct Frontier {
    claimed: HashSet<String>,
}

enum Claim {
    Fresh,
    Seen,
    Exhausted,
}

impl Frontier {
    fn seeded(root: &str) -> Self {
        Self {
            claimed: HashSet::from([root.to_string()]),
        }
    }

    fn claim(&mut self, location: &str, budget: usize) -> Claim {
        if self.claimed.contains(location) {
            Claim::Seen
        } else if self.claimed.len() >= budget {
            Claim::Exhausted
        } else {
            self.claimed.insert(location.to_string());
            Claim::Fresh
        }
    }
}

/// A child entry before it has been claimed.
struct ChildRef {
    location: String,
    kind: NodeKind,
    metadata: EntryMetadata,
}

impl Traversal {
    /// Counts the unit as outstanding before it is spawned.
    fn dispatch(self: &Arc<Self>, node: SitemapNode) {
        let guard = self.tracker.register();
        let traversal = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            traversal.visit(node).await;
        });
    }

    async fn visit(self: &Arc<Self>, node: SitemapNode) {
        let result = if node.kind.is_document() {
            self.visit_document(node).await
        } else {
            self.visit_page(node).await
        };
        self.record(result).await;
    }

    async fn visit_page(&self, node: SitemapNode) -> VisitResult {
        match self.guarded(self.fetcher.fetch_head_only(&node.location)).await {
            Ok(status_code) => VisitResult::new(node, FetchOutcome::responded(status_code, false)),
            Err(err) => {
                log_fetch_error(&node, &err);
                VisitResult::failed(node, err)
            }
        }
    }

    async fn visit_document(self: &Arc<Self>, node: SitemapNode) -> VisitResult {
        let body = match self.guarded(self.fetcher.fetch_body(&node.location)).await {
            Ok(body) => body,
            Err(err) => {
                log_fetch_error(&node, &err);
                return VisitResult::failed(node, err);
            }
        };

        let outcome = FetchOutcome::responded(body.status_code, body.has_body());
        if !body.is_success() {
            warn!("Sitemap {} answered {}", node.location, body.status_code);
            return VisitResult::new(node, outcome);
        }

        let document = match self.decode(body.bytes).await {
            Ok(document) => document,
            Err(err) => {
                warn!("Could not decode {}: {}", node.location, err);
                return VisitResult::new(node, outcome).with_decode_error(err);
            }
        };

        let (node, children) = match document {
            SitemapDocument::Index(entries) => {
                let children = entries
                    .into_iter()
                    .map(|entry| ChildRef {
                        metadata: entry.metadata(),
                        location: entry.location,
                        kind: NodeKind::Unknown,
                    })
                    .collect::<Vec<_>>();
                (node.resolved(NodeKind::Index), children)
            }
            SitemapDocument::UrlSet(entries) => {
                let children = entries
                    .into_iter()
                    .map(|entry| ChildRef {
                        metadata: entry.metadata(),
                        location: entry.location,
                        kind: NodeKind::Page,
                    })
                    .collect::<Vec<_>>();
                (node.resolved(NodeKind::UrlSet), children)
            }
        };

        debug!("{} ({}) declares {} entries", node.location, node.kind, children.len());
        let child_count = children.len();
        let truncation = self.expand(&node, children).await;
        VisitResult::new(node, outcome).with_children(child_count, truncation)
    }

    /// Claims and dispatches children. Returns the guard that stopped
    /// expansion early, if any.
    async fn expand(self: &Arc<Self>, parent: &SitemapNode, children: Vec<ChildRef>) -> Option<Truncation> {
        if children.is_empty() {
            return None;
        }
        if parent.depth >= self.max_depth {
            warn!(
                "Not expanding {}: children would sit below max depth {}",
                parent.location, self.max_depth
            );
            return Some(Truncation::MaxDepth {
                limit: self.max_depth,
            });
        }

        let base = Url::parse(&parent.location).ok();
        let total = children.len();
        for (dispatched, child) in children.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                let remaining = total - dispatched;
                debug!(
                    "Cancelled, {} children of {} not dispatched",
                    remaining, parent.location
                );
                return Some(Truncation::Cancelled { remaining });
            }

            let (location, valid) = match resolve_location(base.as_ref(), &child.location) {
                Some(location) => (location, true),
                None => (child.location, false),
            };

            let claim = self.frontier.lock().await.claim(&location, self.max_nodes);
            match claim {
                Claim::Fresh => {
                    let node = SitemapNode::child(parent, location, child.kind, child.metadata);
                    if valid {
                        self.dispatch(node);
                    } else {
                        warn!("Skipping unusable location {:?} in {}", node.location, parent.location);
                        let err = FetchError::InvalidLocation(node.location.clone());
                        self.record(VisitResult::failed(node, err)).await;
                    }
                }
                Claim::Seen => {
                    debug!("{} already claimed, recording backreference from {}", location, parent.location);
                    let backreference = Backreference {
                        parent_location: parent.location.clone(),
                        location,
                    };
                    if let Err(e) = self.aggregator.record_backreference(backreference).await {
                        error!("Lost backreference: {}", e);
                    }
                }
                Claim::Exhausted => {
                    warn!(
                        "Node budget of {} exhausted while expanding {}",
                        self.max_nodes, parent.location
                    );
                    return Some(Truncation::MaxNodes {
                        limit: self.max_nodes,
                    });
                }
            }
        }
        None
    }

    /// Parses on the blocking pool so a large document does not stall the
    /// other units scheduled on this worker.
    async fn decode(&self, bytes: Vec<u8>) -> std::result::Result<SitemapDocument, DecodeError> {
        let decoder = self.decoder;
        tokio::task::spawn_blocking(move || decoder.decode(&bytes))
            .await
            .unwrap_or_else(|e| Err(DecodeError::Xml(format!("decoder task failed: {}", e))))
    }

    /// Runs a fetch inside a concurrency slot, abandoning it on cancellation.
    async fn guarded<T>(
        &self,
        fetch: impl Future<Output = std::result::Result<T, FetchError>>,
    ) -> std::result::Result<T, FetchError> {
        let Some(_permit) = self.acquire_slot().await else {
            return Err(FetchError::Cancelled);
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FetchError::Cancelled),
            outcome = fetch => outcome,
        }
    }

    async fn acquire_slot(&self) -> Option<SemaphorePermit<'_>> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            permit = self.slots.acquire() => permit.ok(),
        }
    }

    async fn record(&self, result: VisitResult) {
        if let Some(ref callback) = self.progress_callback {
            callback(&result);
        }
        if let Err(e) = self.aggregator.record(result).await {
            error!("Result rejected by aggregator: {}", e);
        }
    }
}

fn log_fetch_error(node: &SitemapNode, err: &FetchError) {
    match err {
        FetchError::Cancelled => debug!("{} cancelled", node.location),
        _ => warn!("Fetch failed for {}: {}", node.location, err),
    }
}

fn normalize_root(root_location: &str) -> Result<String> {
    let mut url = Url::parse(root_location.trim())
        .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", root_location, e)))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ScanError::InvalidUrl(format!(
            "{}: expected an absolute http(s) URL",
            root_location
        )));
    }
    url.set_fragment(None);
    Ok(url.to_string())
}

/// Resolves a `<loc>` against the document that declared it.
fn resolve_location(base: Option<&Url>, raw: &str) -> Option<String> {
    let mut url = match base {
        Some(base) => base.join(raw).ok()?,
        None => Url::parse(raw).ok()?,
    };
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

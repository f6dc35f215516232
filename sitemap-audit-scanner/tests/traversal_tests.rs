// Traversal properties checked against an in-memory site

use async_trait::async_trait;
use sitemap_audit_scanner::{
    CrawlConfig, CrawlStatus, Crawler, FetchError, FetchedBody, Fetcher, NodeKind, ReportRow,
    Truncation,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SITE: &str = "https://shop.example.com";

/// Serves canned documents and page statuses, counting every request.
#[derive(Default)]
struct StaticSite {
    documents: HashMap<String, String>,
    pages: HashMap<String, u16>,
    broken: Vec<String>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    requests: Mutex<HashMap<String, usize>>,
}

impl StaticSite {
    fn document(mut self, location: &str, body: String) -> Self {
        self.documents.insert(location.to_string(), body);
        self
    }

    fn page(mut self, location: &str, status: u16) -> Self {
        self.pages.insert(location.to_string(), status);
        self
    }

    fn broken(mut self, location: &str) -> Self {
        self.broken.push(location.to_string());
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn requests_for(&self, location: &str) -> usize {
        self.requests.lock().unwrap().get(location).copied().unwrap_or(0)
    }

    async fn enter(&self, location: &str) -> Result<(), FetchError> {
        *self.requests.lock().unwrap().entry(location.to_string()).or_insert(0) += 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.broken.iter().any(|b| b == location) {
            return Err(FetchError::Connect(format!("connection reset by {}", location)));
        }
        Ok(())
    }
}

#[async_trait]
impl Fetcher for StaticSite {
    async fn fetch_body(&self, url: &str) -> Result<FetchedBody, FetchError> {
        self.enter(url).await?;
        Ok(match self.documents.get(url) {
            Some(body) => FetchedBody {
                status_code: 200,
                bytes: body.as_bytes().to_vec(),
            },
            None => FetchedBody {
                status_code: 404,
                bytes: Vec::new(),
            },
        })
    }

    async fn fetch_head_only(&self, url: &str) -> Result<u16, FetchError> {
        self.enter(url).await?;
        Ok(self.pages.get(url).copied().unwrap_or(404))
    }
}

fn index(children: &[String]) -> String {
    let entries: String = children
        .iter()
        .map(|c| format!("<sitemap><loc>{}</loc><lastmod>2024-05-01</lastmod></sitemap>", c))
        .collect();
    format!("<sitemapindex>{}</sitemapindex>", entries)
}

fn url_set(children: &[String]) -> String {
    let entries: String = children
        .iter()
        .map(|c| format!("<url><loc>{}</loc></url>", c))
        .collect();
    format!("<urlset>{}</urlset>", entries)
}

/// Root index -> 3 URL sets -> 4 pages each: 16 distinct locations.
fn catalogue() -> StaticSite {
    let mut site = StaticSite::default();
    let sets: Vec<String> = (0..3).map(|s| format!("{}/sitemap-{}.xml", SITE, s)).collect();
    site = site.document(&format!("{}/sitemap.xml", SITE), index(&sets));
    for (s, set) in sets.iter().enumerate() {
        let pages: Vec<String> = (0..4).map(|p| format!("{}/products/{}-{}", SITE, s, p)).collect();
        site = site.document(set, url_set(&pages));
        for (p, page) in pages.iter().enumerate() {
            let status = if p == 3 { 404 } else { 200 };
            site = site.page(page, status);
        }
    }
    site
}

async fn crawl(site: Arc<StaticSite>, config: CrawlConfig) -> sitemap_audit_scanner::CrawlReport {
    Crawler::with_fetcher(config, site)
        .unwrap()
        .traverse(&format!("{}/sitemap.xml", SITE))
        .await
        .unwrap()
}

fn sorted_rows(mut rows: Vec<ReportRow>) -> Vec<ReportRow> {
    rows.sort_by(|a, b| a.location.cmp(&b.location));
    rows
}

#[tokio::test]
async fn test_every_node_reported_exactly_once() {
    let site = Arc::new(catalogue());
    let report = crawl(site.clone(), CrawlConfig::default().with_concurrency(4)).await;

    assert_eq!(report.status, CrawlStatus::Completed);
    assert_eq!(report.len(), 16);
    assert!(report.backreferences.is_empty());
    for result in report.iter() {
        assert_eq!(site.requests_for(result.location()), 1, "{}", result.location());
    }

    let counts = report.status_counts();
    assert_eq!(counts.get(&200), Some(&(1 + 3 + 9)));
    assert_eq!(counts.get(&404), Some(&3));

    let set = report.get(&format!("{}/sitemap-1.xml", SITE)).unwrap();
    assert_eq!(set.node.metadata.last_modified.as_deref(), Some("2024-05-01"));
    assert_eq!(report.children_of(&set.node.location).count(), 4);
}

#[tokio::test]
async fn test_concurrency_does_not_change_content() {
    let serial = crawl(Arc::new(catalogue()), CrawlConfig::default().with_concurrency(1)).await;
    let parallel = crawl(Arc::new(catalogue()), CrawlConfig::default().with_concurrency(16)).await;

    assert_eq!(sorted_rows(serial.rows()), sorted_rows(parallel.rows()));
}

#[tokio::test]
async fn test_in_flight_fetches_respect_limit() {
    let site = Arc::new(catalogue().with_delay(Duration::from_millis(15)));
    let report = crawl(site.clone(), CrawlConfig::default().with_concurrency(3)).await;

    assert_eq!(report.len(), 16);
    let peak = site.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak in-flight fetches was {}", peak);
    assert!(peak >= 2, "expected some parallelism, peak was {}", peak);
}

#[tokio::test]
async fn test_broken_branch_does_not_stop_siblings() {
    let site = Arc::new(catalogue().broken(&format!("{}/sitemap-0.xml", SITE)));
    let report = crawl(site, CrawlConfig::default()).await;

    // the 4 pages under sitemap-0 are never discovered
    assert_eq!(report.len(), 12);
    let broken = report.get(&format!("{}/sitemap-0.xml", SITE)).unwrap();
    assert_eq!(broken.fetch.status_code, 0);
    assert!(matches!(broken.fetch.error, Some(FetchError::Connect(_))));
    assert_eq!(broken.child_count, 0);
    assert_eq!(broken.node.kind, NodeKind::Unknown);

    assert_eq!(report.children_of(&format!("{}/sitemap-2.xml", SITE)).count(), 4);
}

#[tokio::test]
async fn test_diamond_and_cycle_are_deduplicated() {
    let root = format!("{}/sitemap.xml", SITE);
    let left = format!("{}/left.xml", SITE);
    let right = format!("{}/right.xml", SITE);
    let shared = format!("{}/shared.xml", SITE);
    let page = format!("{}/page", SITE);

    let site = Arc::new(
        StaticSite::default()
            .document(&root, index(&[left.clone(), right.clone()]))
            .document(&left, index(&[shared.clone()]))
            .document(&right, index(&[shared.clone(), root.clone()]))
            .document(&shared, url_set(&[page.clone(), page.clone()]))
            .page(&page, 200),
    );
    let report = crawl(site.clone(), CrawlConfig::default().with_concurrency(8)).await;

    assert_eq!(report.len(), 5);
    assert_eq!(site.requests_for(&shared), 1);
    assert_eq!(site.requests_for(&root), 1);
    // shared from the losing parent, root from right, page listed twice
    assert_eq!(report.backreferences.len(), 3);
}

#[tokio::test]
async fn test_page_metadata_and_kind() {
    let root = format!("{}/sitemap.xml", SITE);
    let site = Arc::new(
        StaticSite::default()
            .document(
                &root,
                format!(
                    "<urlset><url><loc>{}/a</loc><changefreq>weekly</changefreq><priority>0.4</priority></url></urlset>",
                    SITE
                ),
            )
            .page(&format!("{}/a", SITE), 200),
    );
    let report = crawl(site, CrawlConfig::default()).await;

    let page = report.get(&format!("{}/a", SITE)).unwrap();
    assert_eq!(page.node.kind, NodeKind::Page);
    assert_eq!(page.node.depth, 1);
    assert_eq!(page.node.metadata.change_frequency.as_deref(), Some("weekly"));
    assert_eq!(page.node.metadata.priority, Some(0.4));
    assert!(!page.fetch.body_available);
    assert_eq!(report.root().unwrap().node.kind, NodeKind::UrlSet);
}

#[tokio::test]
async fn test_progress_callback_sees_every_result() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let crawler = Crawler::with_fetcher(CrawlConfig::default(), Arc::new(catalogue()))
        .unwrap()
        .with_progress_callback(Arc::new(move |_result| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

    let report = crawler.traverse(&format!("{}/sitemap.xml", SITE)).await.unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), report.len());
}

#[tokio::test]
async fn test_crawler_can_be_reused() {
    let crawler = Crawler::with_fetcher(CrawlConfig::default(), Arc::new(catalogue())).unwrap();
    let first = crawler.traverse(&format!("{}/sitemap.xml", SITE)).await.unwrap();
    let second = crawler.traverse(&format!("{}/sitemap.xml", SITE)).await.unwrap();
    assert_eq!(first.len(), second.len());
}

/// Serves one document and cancels the crawl while answering it.
struct CancelsOnFetch {
    body: String,
    token: Mutex<Option<CancellationToken>>,
}

#[async_trait]
impl Fetcher for CancelsOnFetch {
    async fn fetch_body(&self, _url: &str) -> Result<FetchedBody, FetchError> {
        if let Some(token) = self.token.lock().unwrap().as_ref() {
            token.cancel();
        }
        Ok(FetchedBody {
            status_code: 200,
            bytes: self.body.as_bytes().to_vec(),
        })
    }

    async fn fetch_head_only(&self, _url: &str) -> Result<u16, FetchError> {
        Ok(200)
    }
}

#[tokio::test]
async fn test_cancellation_marks_parent_with_undispatched_children() {
    let children: Vec<String> = (0..3).map(|i| format!("{}/sitemap-{}.xml", SITE, i)).collect();
    let fetcher = Arc::new(CancelsOnFetch {
        body: index(&children),
        token: Mutex::new(None),
    });
    let crawler = Crawler::with_fetcher(CrawlConfig::default(), fetcher.clone()).unwrap();
    *fetcher.token.lock().unwrap() = Some(crawler.cancellation_token());

    let report = crawler.traverse(&format!("{}/sitemap.xml", SITE)).await.unwrap();

    assert_eq!(report.status, CrawlStatus::Cancelled);
    assert_eq!(report.len(), 1);
    let root = report.root().unwrap();
    assert_eq!(root.fetch.status_code, 200);
    assert_eq!(root.child_count, 3);
    assert_eq!(root.truncation, Some(Truncation::Cancelled { remaining: 3 }));
    assert_eq!(
        report.rows()[0].error.as_deref(),
        Some("truncated: cancelled with 3 entries not dispatched")
    );
}

#[tokio::test]
async fn test_large_document_is_decoded() {
    let pages: Vec<String> = (0..20_000).map(|i| format!("{}/products/{}", SITE, i)).collect();
    let root = format!("{}/sitemap.xml", SITE);
    let site = Arc::new(StaticSite::default().document(&root, url_set(&pages)));

    let report = crawl(site, CrawlConfig::default().with_max_depth(0)).await;

    assert_eq!(report.len(), 1);
    let root = report.root().unwrap();
    assert_eq!(root.node.kind, NodeKind::UrlSet);
    assert!(root.decode_error.is_none());
    assert_eq!(root.child_count, 20_000);
    assert_eq!(root.truncation, Some(Truncation::MaxDepth { limit: 0 }));
}

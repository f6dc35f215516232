use indicatif::{ProgressBar, ProgressStyle};
use sitemap_audit_scanner::{CrawlConfig, CrawlReport, Crawler, ProgressCallback, ScanError, VisitResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    pub root: String,
    pub config: CrawlConfig,
    pub show_progress_bars: bool,
    /// Cancel the crawl on Ctrl-C and still return what was collected.
    pub cancel_on_interrupt: bool,
}

impl CrawlOptions {
    pub fn new(root: impl Into<String>, config: CrawlConfig) -> Self {
        Self {
            root: root.into(),
            config,
            show_progress_bars: false,
            cancel_on_interrupt: false,
        }
    }
}

/// Callback for reporting individual results as they come in
pub type CrawlResultCallback = Arc<dyn Fn(&VisitResult) + Send + Sync>;

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Execute a crawl with the given options
/// Returns the finalized report, partial if the crawl was interrupted
pub async fn execute_crawl(
    options: CrawlOptions,
    result_callback: Option<CrawlResultCallback>,
) -> Result<CrawlReport, ScanError> {
    let CrawlOptions {
        root,
        config,
        show_progress_bars,
        cancel_on_interrupt,
    } = options;

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Fetching {}", root));
        Some(pb)
    } else {
        None
    };

    let checked = Arc::new(AtomicUsize::new(0));
    let problems = Arc::new(AtomicUsize::new(0));

    let pb_clone = progress_bar.clone();
    let checked_clone = checked.clone();
    let problems_clone = problems.clone();
    let progress_callback: ProgressCallback = Arc::new(move |result: &VisitResult| {
        let count = checked_clone.fetch_add(1, Ordering::Relaxed) + 1;
        let failing = if result.is_healthy() {
            problems_clone.load(Ordering::Relaxed)
        } else {
            problems_clone.fetch_add(1, Ordering::Relaxed) + 1
        };
        if let Some(ref pb) = pb_clone {
            pb.set_message(format!(
                "Checked {} locations, {} problems. Last: {}",
                count,
                failing,
                extract_url_path(result.location())
            ));
        }
        if let Some(ref cb) = result_callback {
            cb(result);
        }
    });

    let crawler = Crawler::new(config)?.with_progress_callback(progress_callback);

    let interrupt_watcher = if cancel_on_interrupt {
        let token = crawler.cancellation_token();
        Some(tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, finishing with a partial report");
                token.cancel();
            }
        }))
    } else {
        None
    };

    let outcome = crawler.traverse(&root).await;

    if let Some(watcher) = interrupt_watcher {
        watcher.abort();
    }
    if let Some(pb) = progress_bar {
        match outcome {
            Ok(ref report) => pb.finish_with_message(format!(
                "Checked {} locations, {} problems",
                report.len(),
                problems.load(Ordering::Relaxed)
            )),
            Err(_) => pb.finish_and_clear(),
        }
    }

    outcome
}

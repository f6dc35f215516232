// Tests for crawl helpers

use sitemap_audit_core::crawl::{CrawlOptions, extract_url_path};
use sitemap_audit_scanner::CrawlConfig;

// ============================================================================
// URL Path Extraction Tests
// ============================================================================

#[test]
fn test_extract_url_path_root() {
    assert_eq!(extract_url_path("https://example.com/"), "/");
}

#[test]
fn test_extract_url_path_empty_path() {
    assert_eq!(extract_url_path("https://example.com"), "/");
}

#[test]
fn test_extract_url_path_nested() {
    assert_eq!(
        extract_url_path("https://example.com/products/shoes/red"),
        "/products/shoes/red"
    );
}

#[test]
fn test_extract_url_path_with_query_and_fragment() {
    assert_eq!(extract_url_path("https://example.com/search?q=x#top"), "/search");
}

#[test]
fn test_extract_url_path_sitemap_file() {
    assert_eq!(
        extract_url_path("https://example.com:8443/sitemaps/index.xml"),
        "/sitemaps/index.xml"
    );
}

#[test]
fn test_extract_url_path_invalid_url() {
    let url = "not a valid url";
    // Should return original string for invalid URLs
    assert_eq!(extract_url_path(url), url);
}

// ============================================================================
// Crawl Options Tests
// ============================================================================

#[test]
fn test_crawl_options_defaults_are_quiet() {
    let options = CrawlOptions::new(
        "https://example.com/sitemap.xml",
        CrawlConfig::default().with_concurrency(4),
    );
    assert_eq!(options.root, "https://example.com/sitemap.xml");
    assert_eq!(options.config.concurrency, 4);
    assert!(!options.show_progress_bars);
    assert!(!options.cancel_on_interrupt);
}

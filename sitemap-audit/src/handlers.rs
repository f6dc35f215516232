use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::*;
use sitemap_audit_core::crawl::{CrawlOptions, execute_crawl, extract_url_path};
use sitemap_audit_core::report::{ReportFormat, ReportSummary, generate_report, save_report};
use sitemap_audit_scanner::{
    CrawlConfig, CrawlStatus, Fetcher, HttpFetcher, SitemapDecoder, SitemapDocument,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use url::Url;

/// Every location answered 2xx and the crawl ran to completion.
pub const EXIT_CLEAN: i32 = 0;
/// The crawl finished but some location failed, was not 2xx, or was cut short.
pub const EXIT_PROBLEMS: i32 = 1;
/// The crawl could not run at all.
pub const EXIT_FATAL: i32 = 2;

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

/// Installs the stderr log subscriber. Repeated calls are ignored.
pub fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn build_crawl_config(args: &ArgMatches) -> CrawlConfig {
    let defaults = CrawlConfig::default();
    let mut config = CrawlConfig::default()
        .with_concurrency(args.get_one::<usize>("threads").copied().unwrap_or(defaults.concurrency))
        .with_max_depth(args.get_one::<usize>("max-depth").copied().unwrap_or(defaults.max_depth))
        .with_max_nodes(args.get_one::<usize>("max-nodes").copied().unwrap_or(defaults.max_nodes))
        .with_head_fallback_get(!args.get_flag("no-head-fallback"));

    if let Some(secs) = args.get_one::<u64>("timeout") {
        config = config.with_request_timeout(Duration::from_secs(*secs));
    }
    if let Some(secs) = args.get_one::<u64>("crawl-timeout") {
        config = config.with_crawl_timeout(Duration::from_secs(*secs));
    }
    if let Some(agent) = args.get_one::<String>("user-agent") {
        config = config.with_user_agent(agent.clone());
    }
    config
}

pub fn selected_format(args: &ArgMatches) -> ReportFormat {
    args.get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Csv)
}

/// Expands `~` in a user supplied output path.
pub fn resolve_output_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

pub fn exit_code_for(summary: &ReportSummary) -> i32 {
    if summary.is_clean() {
        EXIT_CLEAN
    } else {
        EXIT_PROBLEMS
    }
}

/// Runs a crawl and writes the report. Returns the process exit code.
pub async fn handle_crawl(args: &ArgMatches, quiet: bool) -> Result<i32> {
    let url = args
        .get_one::<Url>("URL")
        .context("a root sitemap URL is required")?;
    let config = build_crawl_config(args);
    let format = selected_format(args);

    if !quiet {
        eprintln!("\n{} {}", "Crawling".bright_white().bold(), url);
        eprintln!(
            "Workers: {}  Max depth: {}  Max nodes: {}\n",
            config.concurrency, config.max_depth, config.max_nodes
        );
    }

    let mut options = CrawlOptions::new(url.as_str(), config);
    options.show_progress_bars = !quiet;
    options.cancel_on_interrupt = true;

    let report = execute_crawl(options, None)
        .await
        .with_context(|| format!("crawl of {} failed", url))?;
    let summary = ReportSummary::from_report(&report);
    info!(
        "Crawl {:?}: {} locations, {} healthy",
        summary.status, summary.total, summary.healthy
    );

    let content = generate_report(&report, format).context("failed to render report")?;
    match args.get_one::<String>("output") {
        Some(raw) => {
            let path = resolve_output_path(raw);
            save_report(&content, &path)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            if !quiet {
                eprintln!("{} Report saved to: {}", "✓".green().bold(), path.display().to_string().cyan());
            }
        }
        None => print!("{}", content),
    }

    if !quiet && summary.status != CrawlStatus::Completed {
        eprintln!(
            "{} Crawl stopped early ({:?}), the report is partial",
            "⚠".yellow().bold(),
            summary.status
        );
    }

    Ok(exit_code_for(&summary))
}

/// Fetches one sitemap document and lists what it declares.
pub async fn handle_inspect(args: &ArgMatches) -> Result<()> {
    let url = args
        .get_one::<Url>("URL")
        .context("a sitemap URL is required")?;
    let mut config = CrawlConfig::default();
    if let Some(secs) = args.get_one::<u64>("timeout") {
        config = config.with_request_timeout(Duration::from_secs(*secs));
    }

    let fetcher = HttpFetcher::new(&config).context("failed to build HTTP client")?;
    let body = fetcher
        .fetch_body(url.as_str())
        .await
        .with_context(|| format!("failed to fetch {}", url))?;

    print_divider();
    println!("{} {}", "Sitemap:".bright_white().bold(), url);
    println!("{} {}", "Status:".bright_white().bold(), body.status_code);
    if !body.is_success() {
        print_divider();
        anyhow::bail!("{} answered with status {}", url, body.status_code);
    }

    let document = SitemapDecoder::new()
        .decode(&body.bytes)
        .with_context(|| format!("{} is not a sitemap document", url))?;

    match &document {
        SitemapDocument::Index(entries) => {
            println!("{} sitemap index, {} entries", "Kind:".bright_white().bold(), entries.len());
            print_divider();
            for entry in entries {
                match &entry.last_modified {
                    Some(lastmod) => println!("  {} {}", entry.location, lastmod.bright_black()),
                    None => println!("  {}", entry.location),
                }
            }
        }
        SitemapDocument::UrlSet(entries) => {
            println!("{} url set, {} entries", "Kind:".bright_white().bold(), entries.len());
            print_divider();
            for entry in entries {
                let mut details = Vec::new();
                if let Some(lastmod) = &entry.last_modified {
                    details.push(lastmod.clone());
                }
                if let Some(freq) = &entry.change_frequency {
                    details.push(freq.clone());
                }
                if let Some(priority) = entry.priority {
                    details.push(format!("priority {:.1}", priority));
                }
                println!(
                    "  {} {}",
                    extract_url_path(&entry.location),
                    details.join(" ").bright_black()
                );
            }
        }
    }
    if document.is_empty() {
        println!("  {}", "(no entries)".bright_black());
    }
    print_divider();
    Ok(())
}

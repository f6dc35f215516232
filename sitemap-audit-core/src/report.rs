// Report rendering for finished crawls

use crate::crawl::extract_url_path;
use chrono::Utc;
use colored::{ColoredString, Colorize};
use serde::Serialize;
use sitemap_audit_scanner::{Backreference, CrawlReport, CrawlStatus, ReportRow, VisitResult};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub const CSV_HEADER: &str = "parent,location,kind,depth,status,lastmod,error,backreference";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "csv" => Some(ReportFormat::Csv),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
        }
    }
}

/// Headline numbers for a report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub status: CrawlStatus,
    pub total: usize,
    pub sitemaps: usize,
    pub pages: usize,
    pub healthy: usize,
    pub redirects: usize,
    pub client_errors: usize,
    pub server_errors: usize,
    pub transport_failures: usize,
    pub decode_failures: usize,
    pub truncated: usize,
    pub backreferences: usize,
}

impl ReportSummary {
    pub fn from_report(report: &CrawlReport) -> Self {
        let mut summary = Self {
            status: report.status,
            total: report.len(),
            sitemaps: 0,
            pages: 0,
            healthy: 0,
            redirects: 0,
            client_errors: 0,
            server_errors: 0,
            transport_failures: 0,
            decode_failures: 0,
            truncated: report.truncated().count(),
            backreferences: report.backreferences.len(),
        };

        for result in report.iter() {
            if result.node.kind.is_document() {
                summary.sitemaps += 1;
            } else {
                summary.pages += 1;
            }
            if result.fetch.error.is_some() {
                summary.transport_failures += 1;
                continue;
            }
            if result.decode_error.is_some() {
                summary.decode_failures += 1;
            }
            match result.fetch.status_code {
                200..=299 if result.decode_error.is_none() => summary.healthy += 1,
                300..=399 => summary.redirects += 1,
                400..=499 => summary.client_errors += 1,
                500..=599 => summary.server_errors += 1,
                _ => {}
            }
        }
        summary
    }

    /// True when every location answered 2xx and decoded.
    pub fn is_clean(&self) -> bool {
        self.healthy == self.total && self.status == CrawlStatus::Completed
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    summary: ReportSummary,
    results: &'a [VisitResult],
    backreferences: &'a [Backreference],
}

pub fn generate_report(report: &CrawlReport, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(report)),
        ReportFormat::Json => generate_json_report(report),
        ReportFormat::Csv => Ok(generate_csv_report(report)),
    }
}

/// One row per parent/location pair, parents listed before their children
/// wherever the traversal order allows. A location listed by several
/// sitemaps gets a row under each of them.
pub fn generate_csv_report(report: &CrawlReport) -> String {
    let mut rows = report.rows();
    rows.sort_by(|a, b| a.depth.cmp(&b.depth));

    let mut csv = String::with_capacity(rows.len() * 96);
    csv.push_str(CSV_HEADER);
    csv.push('\n');
    for row in &rows {
        csv.push_str(&csv_line(row));
        csv.push('\n');
    }
    csv
}

fn csv_line(row: &ReportRow) -> String {
    [
        csv_field(&row.parent_location),
        csv_field(&row.location),
        row.kind.as_str().to_string(),
        row.depth.to_string(),
        row.status_code.to_string(),
        csv_field(row.last_modified.as_deref().unwrap_or("")),
        csv_field(row.error.as_deref().unwrap_or("")),
        row.backreference.to_string(),
    ]
    .join(",")
}

/// Quotes a field when it contains a delimiter, quote or line break.
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn generate_json_report(report: &CrawlReport) -> Result<String, serde_json::Error> {
    let json = JsonReport {
        generated_at: Utc::now().to_rfc3339(),
        summary: ReportSummary::from_report(report),
        results: &report.results,
        backreferences: &report.backreferences,
    };
    serde_json::to_string_pretty(&json)
}

pub fn generate_text_report(report: &CrawlReport) -> String {
    let summary = ReportSummary::from_report(report);
    let mut text = String::new();

    text.push_str(&format!("{}\n\n", "━".repeat(60)));
    text.push_str("Summary:\n");
    text.push_str(&format!("  Crawl status: {}\n", status_label(summary.status)));
    text.push_str(&format!(
        "  Locations checked: {} ({} sitemaps, {} pages)\n",
        summary.total, summary.sitemaps, summary.pages
    ));
    text.push_str(&format!("  Healthy: {}\n", summary.healthy));
    text.push_str(&format!("  Redirects: {}\n", summary.redirects));
    text.push_str(&format!("  Client errors: {}\n", summary.client_errors));
    text.push_str(&format!("  Server errors: {}\n", summary.server_errors));
    text.push_str(&format!("  Transport failures: {}\n", summary.transport_failures));
    text.push_str(&format!("  Undecodable sitemaps: {}\n", summary.decode_failures));
    if summary.truncated > 0 {
        text.push_str(&format!("  Truncated branches: {}\n", summary.truncated));
    }
    if summary.backreferences > 0 {
        text.push_str(&format!(
            "  Repeated references: {}\n",
            summary.backreferences
        ));
    }

    let problems: Vec<&VisitResult> = report.unhealthy().collect();
    if !problems.is_empty() {
        text.push_str("\nProblems:\n");
        for result in problems {
            text.push_str(&format!(
                "  {} {}",
                colored_status(result),
                result.location()
            ));
            if let Some(problem) = result.problem() {
                text.push_str(&format!(" {}", format!("({})", problem).bright_black()));
            }
            text.push('\n');
        }
    }

    text.push_str("\nSitemap tree:\n");
    text.push_str(&generate_sitemap_tree(report));
    text
}

fn status_label(status: CrawlStatus) -> &'static str {
    match status {
        CrawlStatus::Completed => "completed",
        CrawlStatus::Cancelled => "cancelled (partial)",
        CrawlStatus::TimedOut => "timed out (partial)",
    }
}

fn colored_status(result: &VisitResult) -> ColoredString {
    if result.fetch.error.is_some() {
        return "ERR".red().bold();
    }
    let code = result.fetch.status_code.to_string();
    match result.fetch.status_code {
        100..=199 => code.white(),
        200..=299 if result.decode_error.is_some() => code.yellow(),
        200..=299 => code.green(),
        300..=399 => code.cyan(),
        400..=499 => code.yellow(),
        500..=599 => code.red(),
        _ => code.white(),
    }
}

/// Indented tree of the crawl, rebuilt from parent locations.
pub fn generate_sitemap_tree(report: &CrawlReport) -> String {
    let mut children: HashMap<&str, Vec<&VisitResult>> = HashMap::new();
    let mut roots = Vec::new();
    for result in report.iter() {
        match result.node.parent_location.as_deref() {
            Some(parent) => children.entry(parent).or_default().push(result),
            None => roots.push(result),
        }
    }
    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| a.node.location.cmp(&b.node.location));
    }

    let mut tree = String::new();
    for root in roots {
        tree.push_str(&format!(
            "{} {} [{}]\n",
            colored_status(root),
            root.location(),
            root.node.kind
        ));
        render_children(root, &children, "", &mut tree);
    }
    tree
}

fn render_children(
    parent: &VisitResult,
    children: &HashMap<&str, Vec<&VisitResult>>,
    prefix: &str,
    tree: &mut String,
) {
    let Some(siblings) = children.get(parent.location()) else {
        return;
    };
    for (i, child) in siblings.iter().enumerate() {
        let last = i == siblings.len() - 1;
        let (branch, extension) = if last { ("└── ", "    ") } else { ("├── ", "│   ") };
        let label = if child.node.kind.is_document() {
            format!("{} [{}]", child.location(), child.node.kind)
        } else {
            extract_url_path(child.location())
        };
        tree.push_str(&format!("{}{}{} {}", prefix, branch, colored_status(child), label));
        if let Some(truncation) = child.truncation {
            tree.push_str(&format!(" {}", format!("(truncated: {})", truncation).bright_black()));
        }
        tree.push('\n');
        render_children(child, children, &format!("{}{}", prefix, extension), tree);
    }
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

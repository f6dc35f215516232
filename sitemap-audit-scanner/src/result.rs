use crate::error::{DecodeError, FetchError, Truncation};
use crate::node::{NodeKind, SitemapNode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Outcome of a single network operation. Either a status was obtained
/// (`error` is `None`) or the transport failed (`status_code` is 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FetchError>,
    pub body_available: bool,
}

impl FetchOutcome {
    pub fn responded(status_code: u16, body_available: bool) -> Self {
        Self {
            status_code,
            error: None,
            body_available,
        }
    }

    pub fn failed(error: FetchError) -> Self {
        Self {
            status_code: 0,
            error: Some(error),
            body_available: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status_code)
    }
}

/// Terminal record for one visited location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitResult {
    pub node: SitemapNode,
    pub fetch: FetchOutcome,
    /// Entries declared by the document. Zero for pages and failed nodes.
    pub child_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decode_error: Option<DecodeError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncation: Option<Truncation>,
}

impl VisitResult {
    pub fn new(node: SitemapNode, fetch: FetchOutcome) -> Self {
        Self {
            node,
            fetch,
            child_count: 0,
            decode_error: None,
            truncation: None,
        }
    }

    pub fn failed(node: SitemapNode, error: FetchError) -> Self {
        Self::new(node, FetchOutcome::failed(error))
    }

    pub fn with_children(mut self, count: usize, truncation: Option<Truncation>) -> Self {
        self.child_count = count;
        self.truncation = truncation;
        self
    }

    pub fn with_decode_error(mut self, error: DecodeError) -> Self {
        self.decode_error = Some(error);
        self
    }

    pub fn location(&self) -> &str {
        &self.node.location
    }

    /// A 2xx response that decoded (or needed no decoding).
    pub fn is_healthy(&self) -> bool {
        self.fetch.is_success() && self.decode_error.is_none()
    }

    /// Human readable description of whatever went wrong, if anything.
    pub fn problem(&self) -> Option<String> {
        if let Some(ref err) = self.fetch.error {
            return Some(err.to_string());
        }
        if let Some(ref err) = self.decode_error {
            return Some(err.to_string());
        }
        self.truncation.map(|t| format!("truncated: {}", t))
    }
}

/// A location referenced again after another parent already claimed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backreference {
    pub parent_location: String,
    pub location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    Completed,
    Cancelled,
    TimedOut,
}

/// Flat row handed to tabular writers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub parent_location: String,
    pub location: String,
    pub kind: NodeKind,
    pub depth: usize,
    pub status_code: u16,
    pub last_modified: Option<String>,
    pub error: Option<String>,
    /// Set on rows for a parent that listed a location someone else claimed.
    pub backreference: bool,
}

/// Everything a traversal produced. Each location appears exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlReport {
    pub status: CrawlStatus,
    pub results: Vec<VisitResult>,
    pub backreferences: Vec<Backreference>,
}

impl CrawlReport {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VisitResult> {
        self.results.iter()
    }

    pub fn get(&self, location: &str) -> Option<&VisitResult> {
        self.results.iter().find(|r| r.node.location == location)
    }

    pub fn root(&self) -> Option<&VisitResult> {
        self.results.iter().find(|r| r.node.is_root())
    }

    pub fn children_of<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a VisitResult> + 'a {
        self.results
            .iter()
            .filter(move |r| r.node.parent_location.as_deref() == Some(parent))
    }

    /// Number of results per status code. Transport failures count under 0.
    pub fn status_counts(&self) -> BTreeMap<u16, usize> {
        let mut counts = BTreeMap::new();
        for result in &self.results {
            *counts.entry(result.fetch.status_code).or_insert(0) += 1;
        }
        counts
    }

    pub fn unhealthy(&self) -> impl Iterator<Item = &VisitResult> {
        self.results.iter().filter(|r| !r.is_healthy())
    }

    pub fn truncated(&self) -> impl Iterator<Item = &VisitResult> {
        self.results.iter().filter(|r| r.truncation.is_some())
    }

    /// One row per visited location, then one per backreference so every
    /// parent that listed a location shows up. Backreference rows repeat the
    /// outcome of the visit that claimed the location.
    pub fn rows(&self) -> Vec<ReportRow> {
        let by_location: HashMap<&str, &VisitResult> = self
            .results
            .iter()
            .map(|r| (r.node.location.as_str(), r))
            .collect();

        let visited = self.results.iter().map(|r| ReportRow {
            parent_location: r.node.parent_location.clone().unwrap_or_default(),
            location: r.node.location.clone(),
            kind: r.node.kind,
            depth: r.node.depth,
            status_code: r.fetch.status_code,
            last_modified: r.node.metadata.last_modified.clone(),
            error: r.problem(),
            backreference: false,
        });

        let repeated = self.backreferences.iter().filter_map(|b| {
            let target = by_location.get(b.location.as_str())?;
            let depth = by_location
                .get(b.parent_location.as_str())
                .map(|parent| parent.node.depth + 1)
                .unwrap_or(target.node.depth);
            Some(ReportRow {
                parent_location: b.parent_location.clone(),
                location: b.location.clone(),
                kind: target.node.kind,
                depth,
                status_code: target.fetch.status_code,
                last_modified: None,
                error: target.problem(),
                backreference: true,
            })
        });

        visited.chain(repeated).collect()
    }
}

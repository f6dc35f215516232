use serde::{Deserialize, Serialize};
use std::fmt;

/// What a location turned out to be once it was fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A `<sitemapindex>` document.
    Index,
    /// A `<urlset>` document.
    UrlSet,
    /// A page listed by a URL set. Only its status is checked.
    Page,
    /// A document that could not be fetched or decoded.
    Unknown,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Index => "index",
            NodeKind::UrlSet => "urlset",
            NodeKind::Page => "page",
            NodeKind::Unknown => "unknown",
        }
    }

    /// Documents are fetched in full and decoded, pages only probed.
    pub fn is_document(&self) -> bool {
        !matches!(self, NodeKind::Page)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional data a parent sitemap declares about a child entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_frequency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f32>,
}

/// One location in the sitemap tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitemapNode {
    pub location: String,
    /// `None` for the root.
    pub parent_location: Option<String>,
    pub kind: NodeKind,
    pub depth: usize,
    #[serde(default)]
    pub metadata: EntryMetadata,
}

impl SitemapNode {
    pub fn root(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            parent_location: None,
            kind: NodeKind::Unknown,
            depth: 0,
            metadata: EntryMetadata::default(),
        }
    }

    /// A child discovered in `parent`. Documents start as `Unknown` until fetched.
    pub fn child(
        parent: &SitemapNode,
        location: impl Into<String>,
        kind: NodeKind,
        metadata: EntryMetadata,
    ) -> Self {
        Self {
            location: location.into(),
            parent_location: Some(parent.location.clone()),
            kind,
            depth: parent.depth + 1,
            metadata,
        }
    }

    /// The same node with the kind learned from its body.
    pub fn resolved(self, kind: NodeKind) -> Self {
        Self { kind, ..self }
    }

    pub fn is_root(&self) -> bool {
        self.parent_location.is_none()
    }
}

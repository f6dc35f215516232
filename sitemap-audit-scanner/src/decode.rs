use crate::error::DecodeError;
use crate::node::EntryMetadata;
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A `<sitemap>` entry of a sitemap index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub location: String,
    pub last_modified: Option<String>,
}

/// A `<url>` entry of a URL set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlEntry {
    pub location: String,
    pub last_modified: Option<String>,
    pub change_frequency: Option<String>,
    pub priority: Option<f32>,
}

impl IndexEntry {
    pub fn metadata(&self) -> EntryMetadata {
        EntryMetadata {
            last_modified: self.last_modified.clone(),
            ..EntryMetadata::default()
        }
    }
}

impl UrlEntry {
    pub fn metadata(&self) -> EntryMetadata {
        EntryMetadata {
            last_modified: self.last_modified.clone(),
            change_frequency: self.change_frequency.clone(),
            priority: self.priority,
        }
    }
}

/// A decoded sitemap body.
#[derive(Debug, Clone, PartialEq)]
pub enum SitemapDocument {
    Index(Vec<IndexEntry>),
    UrlSet(Vec<UrlEntry>),
}

impl SitemapDocument {
    pub fn len(&self) -> usize {
        match self {
            SitemapDocument::Index(entries) => entries.len(),
            SitemapDocument::UrlSet(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Deserialize)]
struct RawIndex {
    #[serde(rename = "sitemap", default)]
    sitemaps: Vec<RawIndexEntry>,
}

#[derive(Deserialize)]
struct RawIndexEntry {
    #[serde(default)]
    loc: Option<String>,
    #[serde(default)]
    lastmod: Option<String>,
}

#[derive(Deserialize)]
struct RawUrlSet {
    #[serde(rename = "url", default)]
    urls: Vec<RawUrlEntry>,
}

#[derive(Deserialize)]
struct RawUrlEntry {
    #[serde(default)]
    loc: Option<String>,
    #[serde(default)]
    lastmod: Option<String>,
    #[serde(default)]
    changefreq: Option<String>,
    // Kept as text so a junk priority does not sink the whole document.
    #[serde(default)]
    priority: Option<String>,
}

/// Parses sitemap index and URL set documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct SitemapDecoder;

impl SitemapDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decodes either document shape, chosen by the root element.
    pub fn decode(&self, bytes: &[u8]) -> Result<SitemapDocument, DecodeError> {
        let text = as_text(bytes)?;
        match root_element(text)?.as_str() {
            "sitemapindex" => parse_index(text).map(SitemapDocument::Index),
            "urlset" => parse_url_set(text).map(SitemapDocument::UrlSet),
            other => Err(DecodeError::UnrecognizedRoot(other.to_string())),
        }
    }

    pub fn decode_index(&self, bytes: &[u8]) -> Result<Vec<IndexEntry>, DecodeError> {
        let text = as_text(bytes)?;
        expect_root(text, "sitemapindex")?;
        parse_index(text)
    }

    pub fn decode_url_set(&self, bytes: &[u8]) -> Result<Vec<UrlEntry>, DecodeError> {
        let text = as_text(bytes)?;
        expect_root(text, "urlset")?;
        parse_url_set(text)
    }
}

fn as_text(bytes: &[u8]) -> Result<&str, DecodeError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    std::str::from_utf8(bytes).map_err(|e| DecodeError::Encoding(e.to_string()))
}

/// Local name of the first element, ignoring any namespace prefix.
fn root_element(text: &str) -> Result<String, DecodeError> {
    let mut reader = Reader::from_str(text);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Ok(String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase());
            }
            Ok(Event::Eof) => return Err(DecodeError::MissingRoot),
            Ok(_) => continue,
            Err(e) => return Err(DecodeError::Xml(e.to_string())),
        }
    }
}

fn expect_root(text: &str, expected: &str) -> Result<(), DecodeError> {
    let root = root_element(text)?;
    if root == expected {
        Ok(())
    } else {
        Err(DecodeError::UnrecognizedRoot(root))
    }
}

fn parse_index(text: &str) -> Result<Vec<IndexEntry>, DecodeError> {
    let raw: RawIndex =
        quick_xml::de::from_str(text).map_err(|e| DecodeError::Xml(e.to_string()))?;
    Ok(raw
        .sitemaps
        .into_iter()
        .filter_map(|entry| {
            Some(IndexEntry {
                location: non_empty(entry.loc)?,
                last_modified: non_empty(entry.lastmod),
            })
        })
        .collect())
}

fn parse_url_set(text: &str) -> Result<Vec<UrlEntry>, DecodeError> {
    let raw: RawUrlSet =
        quick_xml::de::from_str(text).map_err(|e| DecodeError::Xml(e.to_string()))?;
    Ok(raw
        .urls
        .into_iter()
        .filter_map(|entry| {
            Some(UrlEntry {
                location: non_empty(entry.loc)?,
                last_modified: non_empty(entry.lastmod),
                change_frequency: non_empty(entry.changefreq),
                priority: non_empty(entry.priority).and_then(|p| p.parse().ok()),
            })
        })
        .collect())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

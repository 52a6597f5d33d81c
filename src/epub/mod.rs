pub mod archive;
pub mod container;
pub mod navigation;
pub mod opf;
pub mod reader;

use crate::util::normalize_path;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// An unpacked EPUB package: manifest, reading order and enough metadata to name output.
#[derive(Debug, Default)]
pub struct Package {
    /// Root of the unpacked directory tree.
    pub root: PathBuf,
    /// Absolute path of the package document (OPF).
    pub opf_path: PathBuf,
    pub metadata: PackageMetadata,
    pub manifest: Vec<ManifestItem>,
    /// Manifest ids in declared reading order. Ids missing from the manifest are already dropped.
    pub spine: Vec<String>,
    /// Non-fatal problems found while loading.
    pub warnings: Vec<String>,
}

/// Dublin Core fields used for naming output
#[derive(Debug, Default, Clone, Serialize)]
pub struct PackageMetadata {
    pub titles: Vec<String>,
    pub creators: Vec<String>,
    pub languages: Vec<String>,
}

/// An item in the EPUB manifest
#[derive(Debug, Clone)]
pub struct ManifestItem {
    pub id: String,
    /// Location relative to the package document, percent-decoded.
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

/// One entry of the table of contents, flattened in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub label: String,
    /// Absolute path of the targeted content file.
    pub target: PathBuf,
    pub fragment: Option<String>,
    /// List nesting depth; 0 is a top-level entry.
    pub depth: usize,
}

/// Where the table of contents came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NavSource {
    /// EPUB 3 navigation document
    Nav,
    /// EPUB 2 NCX
    Ncx,
    #[default]
    None,
}

/// Parsed table of contents
#[derive(Debug, Default)]
pub struct Navigation {
    pub entries: Vec<TocEntry>,
    pub source: NavSource,
}

impl Navigation {
    /// Entries that start a chapter. Deeper entries stay inside their parent's text.
    pub fn top_level(&self) -> impl Iterator<Item = &TocEntry> {
        self.entries.iter().filter(|e| e.depth == 0)
    }
}

impl ManifestItem {
    /// True for XHTML/HTML content documents.
    pub fn is_html(&self) -> bool {
        self.media_type.to_ascii_lowercase().contains("html")
    }

    /// Check for a token in the space-separated `properties` attribute.
    pub fn has_property(&self, token: &str) -> bool {
        self.properties
            .as_deref()
            .is_some_and(|p| p.split_whitespace().any(|t| t == token))
    }

    pub fn is_nav(&self) -> bool {
        self.has_property("nav")
    }

    pub fn is_ncx(&self) -> bool {
        self.media_type == "application/x-dtbncx+xml"
    }
}

impl Package {
    /// Directory holding the package document; manifest hrefs are relative to it.
    pub fn opf_dir(&self) -> &Path {
        self.opf_path.parent().unwrap_or(&self.root)
    }

    pub fn item(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|m| m.id == id)
    }

    /// Absolute on-disk location of a manifest item.
    pub fn item_path(&self, item: &ManifestItem) -> PathBuf {
        normalize_path(&self.opf_dir().join(&item.href))
    }

    pub fn nav_item(&self) -> Option<&ManifestItem> {
        self.manifest.iter().find(|m| m.is_nav())
    }

    pub fn ncx_item(&self) -> Option<&ManifestItem> {
        self.manifest.iter().find(|m| m.is_ncx())
    }

    /// Spine items that resolve to manifest entries, with their reading position.
    pub fn spine_items(&self) -> impl Iterator<Item = (usize, &ManifestItem)> {
        self.spine
            .iter()
            .filter_map(|id| self.item(id))
            .enumerate()
    }

    /// Reading position of the spine item stored at `path`.
    pub fn spine_position(&self, path: &Path) -> Option<usize> {
        self.spine_items()
            .find(|(_, item)| self.item_path(item) == path)
            .map(|(index, _)| index)
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata
            .titles
            .first()
            .map(String::as_str)
            .filter(|t| !t.trim().is_empty())
    }
}

use crate::epub::{NavSource, Navigation, Package, TocEntry};
use crate::error::{EpubmarkError, Result};
use crate::util::{collapse_whitespace, decode_entities, resolve_relative, split_href, strip_html_tags};
use log::{debug, warn};
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// A link read from a navigation document before its href is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavLink {
    pub label: String,
    pub href: String,
    pub depth: usize,
}

static TOC_NAV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<nav\b[^>]*\btype\s*=\s*["'][^"']*\btoc\b[^"']*["'][^>]*>(.*?)</nav\s*>"#)
        .expect("valid regex")
});

static NAV_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(/?)(?:ol|ul)\b[^>]*>|<a\b([^>]*)>(.*?)</a\s*>").expect("valid regex")
});

static HREF_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
});

/// Load the table of contents of a package.
///
/// Prefers the EPUB 3 navigation document and falls back to the NCX. A package with
/// neither, or with only a malformed NCX, yields an empty navigation, which makes
/// segmentation follow the spine.
pub fn parse_navigation(
    package: &Package,
    get_content: &dyn Fn(&Path) -> Option<String>,
) -> Navigation {
    if let Some(nav_item) = package.nav_item() {
        let nav_path = package.item_path(nav_item);
        match get_content(&nav_path) {
            Some(content) => {
                let links = parse_nav_xhtml(&content);
                if !links.is_empty() {
                    debug!("navigation document {} has {} entries", nav_item.href, links.len());
                    return Navigation {
                        entries: resolve_links(&nav_path, links),
                        source: NavSource::Nav,
                    };
                }
            }
            None => warn!("navigation document {} is missing", nav_path.display()),
        }
    }

    if let Some(ncx_item) = package.ncx_item() {
        let ncx_path = package.item_path(ncx_item);
        if let Some(content) = get_content(&ncx_path) {
            match parse_ncx(&content) {
                Ok(links) => {
                    debug!("NCX {} has {} entries", ncx_item.href, links.len());
                    return Navigation {
                        entries: resolve_links(&ncx_path, links),
                        source: NavSource::Ncx,
                    };
                }
                Err(e) => warn!("NCX {} is malformed, following the spine: {e}", ncx_item.href),
            }
        }
    }

    Navigation::default()
}

fn resolve_links(document: &Path, links: Vec<NavLink>) -> Vec<TocEntry> {
    let base = document.parent().unwrap_or(Path::new(""));
    links
        .into_iter()
        .map(|link| {
            let (path, fragment) = split_href(&link.href);
            let target = if path.is_empty() {
                document.to_path_buf()
            } else {
                resolve_relative(base, &path)
            };
            TocEntry {
                label: link.label,
                target,
                fragment,
                depth: link.depth,
            }
        })
        .collect()
}

/// Scan a navigation XHTML document for its links.
///
/// Depth follows list nesting: every list open increments a counter and every close
/// decrements it, clamped at zero so stray closing tags cannot go negative. Links in the
/// outermost list are depth 0. Only the `toc` nav is scanned when one is marked.
pub fn parse_nav_xhtml(html: &str) -> Vec<NavLink> {
    let scope = TOC_NAV_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map_or(html, |m| m.as_str());

    let mut links = Vec::new();
    let mut open_lists: usize = 0;

    for caps in NAV_TOKEN_RE.captures_iter(scope) {
        if let Some(attrs) = caps.get(2) {
            let Some(href) = HREF_ATTR_RE.captures(attrs.as_str()).and_then(|h| {
                h.get(1).or_else(|| h.get(2)).map(|m| m.as_str().trim().to_string())
            }) else {
                continue;
            };
            if href.is_empty() {
                continue;
            }
            let inner = caps.get(3).map_or("", |m| m.as_str());
            links.push(NavLink {
                label: collapse_whitespace(&decode_entities(&strip_html_tags(inner))),
                href: decode_entities(&href),
                depth: open_lists.saturating_sub(1),
            });
        } else if caps.get(1).is_some_and(|slash| !slash.as_str().is_empty()) {
            open_lists = open_lists.saturating_sub(1);
        } else {
            open_lists += 1;
        }
    }

    links
}

/// Parse an EPUB 2 NCX. Depth is the `navPoint` nesting level.
pub fn parse_ncx(xml: &str) -> Result<Vec<NavLink>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut links: Vec<NavLink> = Vec::new();
    // Indices into `links` of the open navPoints.
    let mut stack: Vec<usize> = Vec::new();
    let mut in_text = false;
    let mut current_label = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if local == "navPoint" {
                    stack.push(links.len());
                    links.push(NavLink {
                        label: String::new(),
                        href: String::new(),
                        depth: stack.len() - 1,
                    });
                } else if local == "text" && !stack.is_empty() {
                    in_text = true;
                    current_label.clear();
                } else if local == "content" {
                    set_ncx_src(&mut links, &stack, e);
                }
            }
            Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"content" {
                    set_ncx_src(&mut links, &stack, e);
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_text {
                    current_label.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if local == "text" && in_text {
                    in_text = false;
                    if let Some(&index) = stack.last()
                        && links[index].label.is_empty()
                    {
                        links[index].label = collapse_whitespace(&current_label);
                    }
                } else if local == "navPoint" {
                    stack.pop();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(EpubmarkError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    links.retain(|link| !link.href.is_empty());
    Ok(links)
}

fn set_ncx_src(links: &mut [NavLink], stack: &[usize], e: &quick_xml::events::BytesStart<'_>) {
    let Some(&index) = stack.last() else {
        return;
    };
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"src" {
            links[index].href = String::from_utf8_lossy(&attr.value).into_owned();
        }
    }
}

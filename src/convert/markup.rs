//! XHTML to Markdown-ish text.
//!
//! The conversion is a fixed list of text-to-text stages ([`PIPELINE`]). Each stage
//! assumes the shapes produced by the ones before it (links are built before tags are
//! stripped, entities are decoded after tags are gone so `&lt;` never becomes a tag), so
//! the order is part of the contract.

use crate::util::{collapse_whitespace, decode_entities, has_scheme, split_href};
use log::trace;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

/// Receives every image source found during conversion and returns the path to emit.
///
/// Implementations may record side effects (such as queuing a copy) but must answer
/// synchronously.
pub trait ImageRewriter {
    fn rewrite(&mut self, src: &str, base_dir: &Path) -> String;
}

/// Per-document conversion settings
pub struct MarkupOptions<'a> {
    /// Directory of the content document, for resolving relative image sources.
    pub base_dir: &'a Path,
    pub images: Option<&'a mut dyn ImageRewriter>,
}

impl<'a> MarkupOptions<'a> {
    pub fn new(base_dir: &'a Path) -> Self {
        Self {
            base_dir,
            images: None,
        }
    }

    pub fn with_images(base_dir: &'a Path, images: &'a mut dyn ImageRewriter) -> Self {
        Self {
            base_dir,
            images: Some(images),
        }
    }
}

type Stage = fn(&str, &mut MarkupOptions<'_>) -> String;

/// Conversion stages in execution order.
pub const PIPELINE: &[(&str, Stage)] = &[
    ("remove-blocks", remove_blocks),
    ("images", rewrite_images),
    ("links", rewrite_links),
    ("headings", rewrite_headings),
    ("blockquotes", rewrite_blockquotes),
    ("line-breaks", rewrite_line_breaks),
    ("lists", rewrite_lists),
    ("paragraphs", rewrite_paragraphs),
    ("inline-spans", rewrite_inline_spans),
    ("collapse-emphasis", collapse_emphasis_runs),
    ("tighten-spans", tighten_spans),
    ("strip-tags", strip_tags),
    ("entities", decode_references),
    ("navigation-links", strip_navigation_links),
    ("separate-spans", separate_spans),
    ("tighten-spans-again", tighten_spans),
    ("indentation", normalize_indentation),
    ("blank-lines", normalize_blank_lines),
];

/// Convert XHTML content into Markdown-ish text.
pub fn html_to_markup(html: &str, options: &mut MarkupOptions<'_>) -> String {
    let mut text = html.to_string();
    for &(name, stage) in PIPELINE {
        text = stage(&text, options);
        trace!("stage {name}: {} bytes", text.len());
    }
    text.trim().to_string()
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?is)<!--.*?-->|<(?:script|style|head)\b[^>]*/>|<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>|<head\b[^>]*>.*?</head\s*>")
});
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r#"(?s)\s([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
});
static IMG_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?is)<img\b[^>]*>|<image\b[^>]*>"));
static SELF_CLOSED_A_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?is)<a\b[^>]*/>"));
static A_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?is)<a\b([^>]*)>(.*?)</a\s*>"));
static HEADING_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    (1..=6)
        .map(|level| re(&format!(r"(?is)<h{level}\b[^>]*>(.*?)</h{level}\s*>")))
        .collect()
});
static BLOCKQUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?is)<blockquote\b[^>]*>(.*?)</blockquote\s*>"));
static BR_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)<br\b[^>]*>"));
static LI_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)<li\b[^>]*>"));
static LI_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)</li\s*>"));
static LIST_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)<(?:ul|ol)\b[^>]*>"));
static LIST_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)</(?:ul|ol)\s*>"));
static P_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)<p\b[^>]*>"));
static BLOCK_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)</(?:p|div)\s*>"));
static STRONG_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?is)<(?:strong|b)\b[^>]*>(.*?)</(?:strong|b)\s*>"));
static EM_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?is)<(?:em|i)\b[^>]*>(.*?)</(?:em|i)\s*>"));
static CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?is)<(?:code|tt|kbd|samp)\b[^>]*>(.*?)</(?:code|tt|kbd|samp)\s*>")
});
static EMPHASIS_RUN_RE: LazyLock<Regex> = LazyLock::new(|| re(r"\*{4,}"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| re(r"<[^>]+>"));
static MD_LINK_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(!?)\[([^\]\n]*)\]\(([^)\s]*)\)"));
static INTERIOR_SPACES_RE: LazyLock<Regex> = LazyLock::new(|| re(r"[ \t]{2,}"));
static BLANK_LINES_RE: LazyLock<Regex> = LazyLock::new(|| re(r"\n{3,}"));
static INTERNAL_DOC_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\.(?:x?html?|xml|ncx)$"));
static NAV_NAME_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)(?:toc|nav)"));

/// Whether a link target is a navigation artifact rather than a prose link.
///
/// Matches targets whose file name mentions `toc`/`nav`, `#toc` fragments, and any
/// scheme-less reference to another document of the package. This is a heuristic: it
/// also drops genuine cross references between chapters.
pub fn is_navigation_link(href: &str) -> bool {
    let href = href.trim();
    if href.is_empty() || has_scheme(href) {
        return false;
    }
    if href.to_ascii_lowercase().contains("#toc") {
        return true;
    }
    let (path, _) = split_href(href);
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(&path);
    if !file_name.is_empty() && NAV_NAME_RE.is_match(file_name) {
        return true;
    }
    INTERNAL_DOC_RE.is_match(&path)
}

fn attributes(tag_body: &str) -> HashMap<String, String> {
    ATTR_RE
        .captures_iter(tag_body)
        .map(|caps| {
            let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            (caps[1].to_ascii_lowercase(), value.to_string())
        })
        .collect()
}

/// Wrap inline content in `marker`, keeping outer whitespace outside the markers.
fn wrap_span(inner: &str, marker: &str) -> String {
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        return if inner.is_empty() { String::new() } else { " ".into() };
    }
    let lead = if inner.starts_with(char::is_whitespace) { " " } else { "" };
    let trail = if inner.ends_with(char::is_whitespace) { " " } else { "" };
    format!("{lead}{marker}{trimmed}{marker}{trail}")
}

// Stage 1: script, style and head blocks (and comments) vanish with their content.
fn remove_blocks(text: &str, _: &mut MarkupOptions<'_>) -> String {
    BLOCK_RE.replace_all(text, "").into_owned()
}

// Stage 2: <img>/<image> become ![alt](src); images without a source are dropped.
fn rewrite_images(text: &str, options: &mut MarkupOptions<'_>) -> String {
    IMG_RE
        .replace_all(text, |caps: &Captures| {
            let attrs = attributes(&caps[0]);
            let src = ["src", "xlink:href", "href"]
                .iter()
                .find_map(|key| attrs.get(*key))
                .map(|s| s.trim())
                .unwrap_or_default();
            if src.is_empty() {
                return String::new();
            }
            let target = match options.images.as_deref_mut() {
                Some(rewriter) => rewriter.rewrite(src, options.base_dir),
                None => src.to_string(),
            };
            let alt = attrs.get("alt").map(|a| collapse_whitespace(a)).unwrap_or_default();
            format!("![{alt}]({})", target.replace(' ', "%20"))
        })
        .into_owned()
}

// Stage 3: anchors become [label](href), navigation targets keep only their label.
fn rewrite_links(text: &str, _: &mut MarkupOptions<'_>) -> String {
    let text = SELF_CLOSED_A_RE.replace_all(text, "");
    A_RE.replace_all(&text, |caps: &Captures| {
        let label = caps[2].trim();
        let href = attributes(&caps[1]).remove("href").unwrap_or_default();
        let href = href.trim();
        if label.is_empty() || href.is_empty() || is_navigation_link(href) {
            label.to_string()
        } else {
            format!("[{label}]({})", href.replace(' ', "%20"))
        }
    })
    .into_owned()
}

// Stage 4: <hN> becomes N hash marks, the trimmed heading text and a blank line.
fn rewrite_headings(text: &str, _: &mut MarkupOptions<'_>) -> String {
    let mut text = text.to_string();
    for (index, heading_re) in HEADING_RES.iter().enumerate() {
        let hashes = "#".repeat(index + 1);
        text = heading_re
            .replace_all(&text, |caps: &Captures| {
                let content = collapse_whitespace(&BR_RE.replace_all(&caps[1], " "));
                if TAG_RE.replace_all(&content, "").trim().is_empty() {
                    return "\n\n".to_string();
                }
                format!("\n\n{hashes} {content}\n\n")
            })
            .into_owned();
    }
    text
}

// Stage 5
fn rewrite_blockquotes(text: &str, _: &mut MarkupOptions<'_>) -> String {
    BLOCKQUOTE_RE
        .replace_all(text, |caps: &Captures| format!("\n\n> {}\n\n", caps[1].trim()))
        .into_owned()
}

// Stage 6
fn rewrite_line_breaks(text: &str, _: &mut MarkupOptions<'_>) -> String {
    BR_RE.replace_all(text, "\n").into_owned()
}

// Stage 7: items get a "- " marker, closing a list leaves a blank line.
fn rewrite_lists(text: &str, _: &mut MarkupOptions<'_>) -> String {
    let text = LI_OPEN_RE.replace_all(text, "\n- ");
    let text = LI_CLOSE_RE.replace_all(&text, "");
    let text = LIST_OPEN_RE.replace_all(&text, "\n");
    LIST_CLOSE_RE.replace_all(&text, "\n\n").into_owned()
}

// Stage 8: paragraph openers vanish, closers (and </div>) end a block.
fn rewrite_paragraphs(text: &str, _: &mut MarkupOptions<'_>) -> String {
    let text = P_OPEN_RE.replace_all(text, "");
    BLOCK_CLOSE_RE.replace_all(&text, "\n\n").into_owned()
}

// Stage 9: strong, emphasis and code spans.
fn rewrite_inline_spans(text: &str, _: &mut MarkupOptions<'_>) -> String {
    let text = STRONG_RE.replace_all(text, |caps: &Captures| wrap_span(&caps[1], "**"));
    let text = EM_RE.replace_all(&text, |caps: &Captures| wrap_span(&caps[1], "*"));
    CODE_RE
        .replace_all(&text, |caps: &Captures| wrap_span(&caps[1], "`"))
        .into_owned()
}

// Stage 10: four or more asterisks in a row collapse to a strong marker.
fn collapse_emphasis_runs(text: &str, _: &mut MarkupOptions<'_>) -> String {
    EMPHASIS_RUN_RE.replace_all(text, "**").into_owned()
}

// Stages 11 and 16: no whitespace directly inside span markers.
fn tighten_spans(text: &str, _: &mut MarkupOptions<'_>) -> String {
    map_spans(text, |_, inner, _| Some(inner.trim().to_string()), false)
}

// Stage 12
fn strip_tags(text: &str, _: &mut MarkupOptions<'_>) -> String {
    TAG_RE.replace_all(text, "").into_owned()
}

// Stage 13
fn decode_references(text: &str, _: &mut MarkupOptions<'_>) -> String {
    decode_entities(text)
}

// Stage 14: links rebuilt from decoded text get the same navigation filter as stage 3.
fn strip_navigation_links(text: &str, _: &mut MarkupOptions<'_>) -> String {
    MD_LINK_RE
        .replace_all(text, |caps: &Captures| {
            if caps[1].is_empty() && is_navigation_link(&caps[3]) {
                caps[2].to_string()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

// Stage 15: "**bold**word" becomes "**bold** word".
fn separate_spans(text: &str, _: &mut MarkupOptions<'_>) -> String {
    map_spans(text, |_, _, _| None, true)
}

// Stage 17: no leading indentation, single interior spaces.
fn normalize_indentation(text: &str, _: &mut MarkupOptions<'_>) -> String {
    text.lines()
        .map(|line| INTERIOR_SPACES_RE.replace_all(line.trim_start_matches([' ', '\t']), " "))
        .collect::<Vec<_>>()
        .join("\n")
}

// Stage 18: no trailing whitespace, at most one blank line in a row.
fn normalize_blank_lines(text: &str, _: &mut MarkupOptions<'_>) -> String {
    let trimmed = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_LINES_RE.replace_all(&trimmed, "\n\n").into_owned()
}

/// Span delimiters handled by [`map_spans`]: character and exact run length.
const SPAN_DELIMITERS: &[(char, usize)] = &[('*', 2), ('*', 1), ('`', 1)];

/// Visit delimiter-paired spans line by line.
///
/// Runs of exactly the delimiter length are paired in order of appearance. `edit` may
/// return replacement inner text; empty results keep the original. With `separate`, a
/// space is inserted when a closing delimiter is directly followed by an alphanumeric.
fn map_spans(
    text: &str,
    edit: impl Fn(char, &str, usize) -> Option<String>,
    separate: bool,
) -> String {
    let mut out = text.to_string();
    for &(delim, len) in SPAN_DELIMITERS {
        out = out
            .split('\n')
            .map(|line| map_line_spans(line, delim, len, &edit, separate))
            .collect::<Vec<_>>()
            .join("\n");
    }
    out
}

fn map_line_spans(
    line: &str,
    delim: char,
    len: usize,
    edit: &impl Fn(char, &str, usize) -> Option<String>,
    separate: bool,
) -> String {
    if !line.contains(delim) {
        return line.to_string();
    }

    // Byte ranges of delimiter runs with exactly `len` characters.
    let mut runs: Vec<(usize, usize)> = Vec::new();
    let mut chars = line.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if c != delim {
            continue;
        }
        let mut count = 1;
        let mut end = start + c.len_utf8();
        while let Some(&(i, next)) = chars.peek() {
            if next != delim {
                break;
            }
            count += 1;
            end = i + next.len_utf8();
            chars.next();
        }
        if count == len {
            runs.push((start, end));
        }
    }

    let mut out = String::with_capacity(line.len() + 4);
    let mut cursor = 0;
    for pair in runs.chunks_exact(2) {
        let (open, close) = (pair[0], pair[1]);
        let inner = &line[open.1..close.0];
        out.push_str(&line[cursor..open.1]);
        match edit(delim, inner, len) {
            Some(replacement) if !replacement.is_empty() => out.push_str(&replacement),
            _ => out.push_str(inner),
        }
        out.push_str(&line[close.0..close.1]);
        cursor = close.1;
        if separate
            && !inner.trim().is_empty()
            && line[cursor..].starts_with(char::is_alphanumeric)
        {
            out.push(' ');
        }
    }
    out.push_str(&line[cursor..]);
    out
}

use percent_encoding::percent_decode_str;
use regex::{Captures, Regex};
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z][A-Za-z0-9]{1,31});")
        .expect("valid regex")
});

static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("valid regex"));

/// Named references understood by [`decode_entities`]. Anything else is kept verbatim.
const NAMED_ENTITIES: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("nbsp", '\u{a0}'),
];

/// Strip HTML tags from a string, keeping only text content.
pub fn strip_html_tags(html: &str) -> String {
    TAG_RE.replace_all(html, "").trim().to_string()
}

/// Decode named and numeric (decimal and hex) character references.
///
/// Unknown names and out-of-range code points are left as written.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY_RE
        .replace_all(text, |caps: &Captures| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body
                .strip_prefix("#x")
                .or_else(|| body.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                NAMED_ENTITIES
                    .iter()
                    .find(|(name, _)| *name == body)
                    .map(|(_, c)| *c)
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Collapse all whitespace runs to single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True when `href` carries a URI scheme (`http:`, `mailto:`, `data:` ...).
pub fn has_scheme(href: &str) -> bool {
    SCHEME_RE.is_match(href)
}

/// Split a package-internal reference into its percent-decoded path and fragment.
///
/// Query strings are dropped. An empty path means "same document".
pub fn split_href(href: &str) -> (String, Option<String>) {
    let (rest, fragment) = match href.split_once('#') {
        Some((path, frag)) => (path, Some(frag)),
        None => (href, None),
    };
    let path = rest.split('?').next().unwrap_or(rest);
    let decode = |s: &str| percent_decode_str(s).decode_utf8_lossy().into_owned();
    (
        decode(path),
        fragment.filter(|f| !f.is_empty()).map(decode),
    )
}

/// Lexically normalize a path: drop `.` components and fold `..` into the parent.
///
/// Does not touch the filesystem, so it works for paths that do not exist yet.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve a relative reference against the directory of the referring document.
pub fn resolve_relative(base_dir: &Path, relative: &str) -> PathBuf {
    normalize_path(&base_dir.join(relative))
}

/// Render a relative path with `/` separators regardless of host conventions.
pub fn to_forward_slashes(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

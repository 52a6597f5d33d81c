use regex::Regex;
use std::sync::LazyLock;

/// How far back (in bytes) to look for a heading that encloses a matched anchor.
pub const HEADING_LOOKBACK: usize = 512;

static HEADING_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<h[1-6]\b").expect("valid regex"));

static HEADING_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</h[1-6]\s*>").expect("valid regex"));

/// Find the byte offset where the content for `fragment` starts.
///
/// Looks for an element carrying `id` or `name` equal to the fragment. When that element
/// is a heading, or sits inside a heading opened within [`HEADING_LOOKBACK`] bytes, the
/// heading's start tag is returned so the whole heading lands in the slice. Otherwise the
/// start of the matching element is returned. `None` means the anchor does not exist.
pub fn resolve_anchor(content: &str, fragment: &str) -> Option<usize> {
    let pattern = format!(
        r#"[\s"'](?:id|name)\s*=\s*["']{}["']"#,
        regex::escape(fragment)
    );
    let attr_re = Regex::new(&pattern).ok()?;
    let hit = attr_re.find(content)?;

    let tag_start = content[..hit.start()].rfind('<').unwrap_or(hit.start());

    let mut window_start = tag_start.saturating_sub(HEADING_LOOKBACK);
    while !content.is_char_boundary(window_start) {
        window_start += 1;
    }
    Some(enclosing_heading(content, window_start, tag_start).unwrap_or(tag_start))
}

/// Start of a heading tag that is open at `pos`, searching no earlier than `window_start`.
fn enclosing_heading(content: &str, window_start: usize, pos: usize) -> Option<usize> {
    if HEADING_OPEN_RE
        .find(&content[pos..])
        .is_some_and(|m| m.start() == 0)
    {
        return Some(pos);
    }

    let window = &content[window_start..pos];
    let open = HEADING_OPEN_RE.find_iter(window).last()?;
    let closed = HEADING_CLOSE_RE
        .find_iter(window)
        .any(|close| close.start() > open.start());
    (!closed).then_some(window_start + open.start())
}

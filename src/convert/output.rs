use crate::error::Result;
use log::debug;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Maximum length, in characters, of the label part of a split-mode file name.
pub const MAX_LABEL_CHARS: usize = 60;

/// Characters that are not allowed in file names on common filesystems.
const ILLEGAL_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// One converted chapter ready for writing
#[derive(Debug, Clone)]
pub struct RenderedChapter {
    pub label: String,
    pub body: String,
}

/// Prefix `body` with a `# label` heading unless it already opens with a heading.
pub fn with_heading(label: &str, body: &str) -> String {
    let label = label.trim();
    if label.is_empty() || body.starts_with('#') {
        return body.to_string();
    }
    if body.is_empty() {
        format!("# {label}")
    } else {
        format!("# {label}\n\n{body}")
    }
}

/// Join chapters into one document, separated by a blank line. Empty chapters are skipped.
pub fn join_single(chapters: &[RenderedChapter], headings: bool) -> String {
    chapters
        .iter()
        .filter(|c| !c.body.trim().is_empty())
        .map(|c| {
            if headings {
                with_heading(&c.label, &c.body)
            } else {
                c.body.clone()
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Make a chapter label usable as part of a file name.
///
/// `number` is the 1-based chapter position, used for the fallback label.
pub fn sanitize_label(label: &str, number: usize) -> String {
    clean_label(label).unwrap_or_else(|| format!("Chapter {number}"))
}

/// `label` made safe for a file or folder name, or `None` when nothing usable is left.
pub fn clean_label(label: &str) -> Option<String> {
    let cleaned: String = label
        .chars()
        .filter(|c| !ILLEGAL_CHARS.contains(c) && !c.is_control())
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let capped: String = collapsed.chars().take(MAX_LABEL_CHARS).collect();
    let capped = capped.trim_end_matches([' ', '.']);
    (!capped.is_empty()).then(|| capped.to_string())
}

/// File name for chapter `number` (1-based) out of `total`, e.g. `03-Introduction.md`.
pub fn chapter_filename(number: usize, total: usize, label: &str) -> String {
    let width = total.to_string().len().max(2);
    format!("{number:0width$}-{}.md", sanitize_label(label, number))
}

/// Pick the split-mode destination folder.
///
/// In order of preference: the explicit output path (extension dropped), a folder named
/// after the book title, the folder name the user typed, the input's own name. The latter
/// three are placed next to the input.
pub fn split_folder(
    output: Option<&Path>,
    title: Option<&str>,
    prompted: Option<&str>,
    input: &Path,
) -> PathBuf {
    if let Some(output) = output {
        return output.with_extension("");
    }

    let parent = input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let from_title = title.map(slug::slugify).filter(|s| !s.is_empty());
    let from_prompt = prompted.and_then(clean_label);
    let name = from_title.or(from_prompt).unwrap_or_else(|| {
        input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "book".to_string())
    });
    parent.join(name)
}

/// Write the joined document to `path`, or to stdout when no path is given.
pub fn write_single(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, format!("{text}\n"))?;
            debug!("wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{text}")?;
        }
    }
    Ok(())
}

/// Write each chapter to its own file in `dir`, returning the paths written.
pub fn write_split(dir: &Path, chapters: &[RenderedChapter]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let total = chapters.len();
    let mut written = Vec::with_capacity(total);
    for (i, chapter) in chapters.iter().enumerate() {
        let path = dir.join(chapter_filename(i + 1, total, &chapter.label));
        let text = with_heading(&chapter.label, &chapter.body);
        std::fs::write(&path, format!("{text}\n"))?;
        debug!("wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

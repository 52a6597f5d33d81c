use crate::convert::anchor::resolve_anchor;
use crate::epub::{Navigation, Package, TocEntry};
use crate::error::{EpubmarkError, Result};
use log::{debug, warn};
use serde::Serialize;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Spacing between the ordering keys of consecutive files, leaving room for the
/// chapters that share one file.
pub const FILE_ORDER_STRIDE: u64 = 100_000;

/// A slice of one content file that becomes one output chapter.
#[derive(Debug, Clone, Serialize)]
pub struct ChapterRecord {
    pub label: String,
    pub source: PathBuf,
    /// Byte range of the slice within `source`.
    pub range: Range<usize>,
    /// Global ordering key: spine position of the file times [`FILE_ORDER_STRIDE`]
    /// plus the position of the chapter inside the file.
    pub order: u64,
    #[serde(skip)]
    pub content: String,
}

/// How chapter boundaries were found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentMode {
    Navigation,
    Spine,
}

#[derive(Debug)]
pub struct Segmentation {
    pub chapters: Vec<ChapterRecord>,
    pub mode: SegmentMode,
    pub warnings: Vec<String>,
}

/// Split a package into ordered chapters.
///
/// Top-level TOC entries drive the split when there are any; otherwise each HTML
/// spine item is one chapter. Fails when neither approach yields a chapter.
pub fn segment(
    package: &Package,
    navigation: &Navigation,
    get_content: &dyn Fn(&Path) -> Option<String>,
) -> Result<Segmentation> {
    if package.spine.is_empty() {
        return Err(EpubmarkError::NoChaptersFound("spine is empty".into()));
    }
    if !package.spine_items().any(|(_, item)| item.is_html()) {
        return Err(EpubmarkError::NoChaptersFound(
            "spine contains no HTML content documents".into(),
        ));
    }

    let mut warnings = Vec::new();
    let top_level: Vec<&TocEntry> = navigation.top_level().collect();
    if !top_level.is_empty() {
        let chapters = segment_by_navigation(package, &top_level, get_content, &mut warnings);
        if !chapters.is_empty() {
            return Ok(Segmentation {
                chapters,
                mode: SegmentMode::Navigation,
                warnings,
            });
        }
        warnings.push("table of contents yielded no chapters, following the spine".into());
        warn!("table of contents yielded no chapters, following the spine");
    }

    let chapters = segment_by_spine(package, get_content, &mut warnings);
    if chapters.is_empty() {
        return Err(EpubmarkError::NoChaptersFound(
            "no readable content documents in the spine".into(),
        ));
    }
    Ok(Segmentation {
        chapters,
        mode: SegmentMode::Spine,
        warnings,
    })
}

fn note(warnings: &mut Vec<String>, message: String) {
    warn!("{message}");
    warnings.push(message);
}

/// Group entries by target file, keeping first-appearance order of files and TOC order
/// within each file.
fn group_by_file<'a>(entries: &[&'a TocEntry]) -> Vec<(PathBuf, Vec<&'a TocEntry>)> {
    let mut groups: Vec<(PathBuf, Vec<&TocEntry>)> = Vec::new();
    for &entry in entries {
        match groups.iter_mut().find(|(path, _)| *path == entry.target) {
            Some((_, members)) => members.push(entry),
            None => groups.push((entry.target.clone(), vec![entry])),
        }
    }
    groups
}

fn segment_by_navigation(
    package: &Package,
    entries: &[&TocEntry],
    get_content: &dyn Fn(&Path) -> Option<String>,
    warnings: &mut Vec<String>,
) -> Vec<ChapterRecord> {
    let spine_len = package.spine_items().count();
    let mut chapters = Vec::new();
    let mut unplaced = 0;

    for (path, members) in group_by_file(entries) {
        let Some(content) = get_content(&path) else {
            note(warnings, format!("content file missing: {}", path.display()));
            continue;
        };

        let file_index = match package.spine_position(&path) {
            Some(index) => index,
            None => {
                debug!("{} is not in the spine, placing it last", path.display());
                unplaced += 1;
                spine_len + unplaced - 1
            }
        };

        let offsets: Vec<Option<usize>> = members
            .iter()
            .map(|entry| match &entry.fragment {
                None => Some(0),
                Some(fragment) => {
                    let offset = resolve_anchor(&content, fragment);
                    if offset.is_none() {
                        note(
                            warnings,
                            format!(
                                "anchor #{fragment} not found in {}, using previous boundary",
                                path.display()
                            ),
                        );
                    }
                    offset
                }
            })
            .collect();

        let ranges = slice_ranges(&offsets, content.len());
        for (seq, (entry, range)) in members.iter().zip(ranges).enumerate() {
            chapters.push(ChapterRecord {
                label: entry.label.clone(),
                source: path.clone(),
                content: content[range.clone()].to_string(),
                range,
                order: file_index as u64 * FILE_ORDER_STRIDE + seq as u64,
            });
        }
    }

    chapters.sort_by_key(|c| c.order);
    chapters
}

/// Turn anchor offsets, given in TOC order, into ranges that partition the file from its
/// first boundary to `len`.
///
/// An unresolved entry starts where the previous TOC entry does (or at 0). Starts are
/// taken in ascending document order and each range ends at the next start, so entries
/// listed out of document order still get their own text. The returned ranges line up
/// with `offsets`.
pub fn slice_ranges(offsets: &[Option<usize>], len: usize) -> Vec<Range<usize>> {
    let mut starts = Vec::with_capacity(offsets.len());
    let mut previous = 0;
    for offset in offsets {
        let start = offset.unwrap_or(previous).min(len);
        starts.push(start);
        previous = start;
    }

    // stable: entries sharing a start keep TOC order
    let mut by_position: Vec<usize> = (0..starts.len()).collect();
    by_position.sort_by_key(|&i| starts[i]);

    let mut ranges = vec![0..0; starts.len()];
    for (rank, &i) in by_position.iter().enumerate() {
        let end = by_position.get(rank + 1).map_or(len, |&next| starts[next]);
        ranges[i] = starts[i]..end;
    }
    ranges
}

fn segment_by_spine(
    package: &Package,
    get_content: &dyn Fn(&Path) -> Option<String>,
    warnings: &mut Vec<String>,
) -> Vec<ChapterRecord> {
    let mut chapters = Vec::new();
    for (index, item) in package.spine_items() {
        if !item.is_html() {
            continue;
        }
        let path = package.item_path(item);
        let Some(content) = get_content(&path) else {
            note(warnings, format!("content file missing: {}", path.display()));
            continue;
        };
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| item.href.clone());
        chapters.push(ChapterRecord {
            label,
            source: path,
            range: 0..content.len(),
            content,
            order: index as u64,
        });
    }
    chapters
}

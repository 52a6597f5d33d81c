pub mod anchor;
pub mod assets;
pub mod markup;
pub mod output;
pub mod segment;

use crate::epub::Package;
use crate::epub::navigation::parse_navigation;
use crate::error::Result;
use crate::interact::{Progress, Prompter, Reporter};
use crate::util::to_forward_slashes;
use assets::AssetCollector;
use log::debug;
use markup::{MarkupOptions, html_to_markup};
use output::RenderedChapter;
use segment::{SegmentMode, Segmentation, segment};
use serde::Serialize;
use std::path::Path;

/// How converted chapters are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Single,
    Split,
}

/// Run options that may come from flags or from the user.
#[derive(Debug, Clone, Default)]
pub struct Choices {
    pub mode: OutputMode,
    pub images: bool,
    pub folder: Option<String>,
}

/// Options already fixed on the command line; `None` means ask.
#[derive(Debug, Clone, Default)]
pub struct ChoiceFlags {
    pub mode: Option<OutputMode>,
    pub images: Option<bool>,
    /// Whether a split-mode folder name is still needed.
    pub needs_folder: bool,
}

/// Fill in whatever the flags leave open by asking `prompter`.
///
/// Unanswered questions fall back to single-file output without images.
pub fn resolve_choices(flags: &ChoiceFlags, prompter: &mut dyn Prompter) -> Choices {
    let mode = flags.mode.unwrap_or_else(|| {
        match prompter.choose("Output format:", &["single file", "one file per chapter"]) {
            Some(1) => OutputMode::Split,
            _ => OutputMode::Single,
        }
    });
    if mode == OutputMode::Single {
        return Choices {
            mode,
            images: false,
            folder: None,
        };
    }

    let images = flags
        .images
        .or_else(|| prompter.confirm("Copy images next to the chapters?"))
        .unwrap_or(false);
    let folder = if flags.needs_folder {
        prompter.ask("Folder name for the chapters:")
    } else {
        None
    };
    Choices {
        mode,
        images,
        folder,
    }
}

/// Read a content document, replacing invalid UTF-8. `None` if it cannot be read.
pub fn read_content(path: &Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            debug!("cannot read {}: {e}", path.display());
            None
        }
    }
}

/// Find the chapters of a package: load its table of contents and segment the content.
pub fn plan(package: &Package) -> Result<Segmentation> {
    let navigation = parse_navigation(package, &read_content);
    debug!(
        "navigation from {:?}: {} entries",
        navigation.source,
        navigation.entries.len()
    );
    segment(package, &navigation, &read_content)
}

/// One row of the chapter plan, as shown by `--list`
#[derive(Debug, Serialize)]
pub struct PlanEntry {
    pub index: usize,
    pub label: String,
    /// Source file relative to the package root.
    pub source: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Serialize)]
pub struct PlanSummary {
    pub title: Option<String>,
    pub mode: SegmentMode,
    pub chapters: Vec<PlanEntry>,
}

pub fn summarize_plan(package: &Package, segmentation: &Segmentation) -> PlanSummary {
    let chapters = segmentation
        .chapters
        .iter()
        .enumerate()
        .map(|(i, chapter)| PlanEntry {
            index: i + 1,
            label: chapter.label.clone(),
            source: chapter
                .source
                .strip_prefix(&package.root)
                .map(to_forward_slashes)
                .unwrap_or_else(|_| chapter.source.display().to_string()),
            start: chapter.range.start,
            end: chapter.range.end,
        })
        .collect();
    PlanSummary {
        title: package.title().map(str::to_string),
        mode: segmentation.mode,
        chapters,
    }
}

/// Convert every chapter in order, reporting progress after each one.
///
/// With a collector, image references are rewritten to their copied location and queued.
pub fn render(
    segmentation: &Segmentation,
    mut assets: Option<&mut AssetCollector>,
    reporter: &mut dyn Reporter,
) -> Vec<RenderedChapter> {
    let total = segmentation.chapters.len();
    let mut rendered = Vec::with_capacity(total);

    for (i, chapter) in segmentation.chapters.iter().enumerate() {
        let base_dir = chapter.source.parent().unwrap_or(Path::new(""));
        let mut options = match assets.as_deref_mut() {
            Some(collector) => MarkupOptions::with_images(base_dir, collector),
            None => MarkupOptions::new(base_dir),
        };
        let body = html_to_markup(&chapter.content, &mut options);
        debug!(
            "converted {} ({} bytes -> {} bytes)",
            chapter.label,
            chapter.content.len(),
            body.len()
        );

        reporter.report(&Progress {
            processed: i + 1,
            total,
            label: &chapter.label,
        });
        rendered.push(RenderedChapter {
            label: chapter.label.clone(),
            body,
        });
    }

    reporter.finish();
    rendered
}

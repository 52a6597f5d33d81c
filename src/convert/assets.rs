use crate::convert::markup::ImageRewriter;
use crate::util::{has_scheme, normalize_path, split_href, to_forward_slashes};
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Folder, relative to the output directory, that receives copied images.
pub const IMAGES_DIR: &str = "images";

/// Collects image copies requested while chapters are converted.
///
/// An image referenced from several chapters is copied once. Distinct sources always get
/// distinct destinations: when the mirrored path is taken, a numeric suffix is added.
#[derive(Debug)]
pub struct AssetCollector {
    /// Root of the unpacked package. Sources outside it are never copied.
    root: PathBuf,
    /// Directory holding the package document; destinations mirror paths below it.
    content_root: PathBuf,
    pending: BTreeMap<PathBuf, PathBuf>,
    /// Source to its assigned destination.
    assigned: HashMap<PathBuf, PathBuf>,
}

/// Result of executing the queued copies
#[derive(Debug, Default)]
pub struct CopyReport {
    pub copied: usize,
    pub warnings: Vec<String>,
}

impl AssetCollector {
    pub fn new(root: &Path, content_root: &Path) -> Self {
        Self {
            root: normalize_path(root),
            content_root: normalize_path(content_root),
            pending: BTreeMap::new(),
            assigned: HashMap::new(),
        }
    }

    /// Queued copies, destination (relative to the output directory) to source.
    pub fn pending(&self) -> &BTreeMap<PathBuf, PathBuf> {
        &self.pending
    }

    /// Map an image source to its destination, queuing the copy.
    ///
    /// Returns `None` when the source is remote or resolves outside the package.
    pub fn register(&mut self, src: &str, base_dir: &Path) -> Option<String> {
        if has_scheme(src) || src.starts_with("//") {
            return None;
        }
        let (path, _) = split_href(src);
        if path.is_empty() {
            return None;
        }

        let source = normalize_path(&base_dir.join(&path));
        if !source.starts_with(&self.root) {
            warn!("image {src} resolves outside the package, left unchanged");
            return None;
        }
        if let Some(destination) = self.assigned.get(&source) {
            return Some(to_forward_slashes(destination));
        }

        let relative = source
            .strip_prefix(&self.content_root)
            .or_else(|_| source.strip_prefix(&self.root))
            .ok()?;
        let mut components = relative.components().peekable();
        // Avoid images/images/... when the package already keeps images in such a folder.
        if components
            .peek()
            .is_some_and(|c| c.as_os_str().eq_ignore_ascii_case(IMAGES_DIR))
            && relative.components().count() > 1
        {
            components.next();
        }
        let mirrored: PathBuf = Path::new(IMAGES_DIR).join(components.collect::<PathBuf>());

        let mut destination = mirrored.clone();
        let mut n = 1;
        while self.pending.contains_key(&destination) {
            n += 1;
            destination = numbered(&mirrored, n);
        }

        let rendered = to_forward_slashes(&destination);
        debug!("queued image copy {} -> {rendered}", source.display());
        self.assigned.insert(source.clone(), destination.clone());
        self.pending.insert(destination, source);
        Some(rendered)
    }

    /// Copy every queued image below `out_dir`. Failures are reported per asset.
    pub fn copy_all(&self, out_dir: &Path) -> CopyReport {
        let mut report = CopyReport::default();
        for (destination, source) in &self.pending {
            let target = out_dir.join(destination);
            let result = target
                .parent()
                .map_or(Ok(()), std::fs::create_dir_all)
                .and_then(|()| std::fs::copy(source, &target));
            match result {
                Ok(_) => report.copied += 1,
                Err(e) => {
                    let message = format!("failed to copy {}: {e}", source.display());
                    warn!("{message}");
                    report.warnings.push(message);
                }
            }
        }
        report
    }
}

/// `images/a.png` with `n = 2` becomes `images/a-2.png`.
fn numbered(path: &Path, n: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}-{n}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{n}"),
    };
    path.with_file_name(name)
}

impl ImageRewriter for AssetCollector {
    fn rewrite(&mut self, src: &str, base_dir: &Path) -> String {
        self.register(src, base_dir)
            .unwrap_or_else(|| src.to_string())
    }
}

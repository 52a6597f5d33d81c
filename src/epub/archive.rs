use crate::error::{EpubmarkError, Result};
use log::{debug, warn};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::ZipArchive;

/// A package tree ready to read.
///
/// An `.epub` archive is unpacked into a temporary directory that lives as long as this
/// value; a directory input is used in place.
#[derive(Debug)]
pub struct PackageSource {
    root: PathBuf,
    temp: Option<TempDir>,
}

impl PackageSource {
    pub fn open(input: &Path) -> Result<Self> {
        Self::open_with(input, |_| {})
    }

    /// Like [`PackageSource::open`], calling `before_unpack` with the temporary directory
    /// once it exists and before any entry is written into it.
    pub fn open_with(input: &Path, before_unpack: impl FnOnce(&Path)) -> Result<Self> {
        let input = std::path::absolute(input)?;
        if input.is_dir() {
            debug!("reading unpacked package at {}", input.display());
            return Ok(Self {
                root: input,
                temp: None,
            });
        }
        if !input.exists() {
            return Err(EpubmarkError::Extraction(format!(
                "input not found: {}",
                input.display()
            )));
        }

        let temp = tempfile::Builder::new().prefix("epubmark-").tempdir()?;
        before_unpack(temp.path());
        unpack(&input, temp.path())?;
        Ok(Self {
            root: temp.path().to_path_buf(),
            temp: Some(temp),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The temporary directory backing this source, if one was created.
    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp.as_ref().map(TempDir::path)
    }
}

pub fn open_epub(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path).map_err(|e| {
        EpubmarkError::Extraction(format!("cannot open {}: {e}", path.display()))
    })?;
    let archive = ZipArchive::new(file)?;
    Ok(archive)
}

/// Check the leading `mimetype` entry. Readers are lenient here, so problems are returned
/// as a message rather than an error.
pub fn check_mimetype(archive: &mut ZipArchive<File>) -> Option<String> {
    let Ok(mut mimetype) = archive.by_index(0) else {
        return Some("archive is empty".into());
    };

    if mimetype.name() != "mimetype" {
        return Some("first entry is not 'mimetype'".into());
    }

    let mut content = String::new();
    if mimetype.read_to_string(&mut content).is_err() {
        return Some("unreadable mimetype entry".into());
    }

    if content.trim() != "application/epub+zip" {
        return Some(format!("unexpected mimetype: {}", content.trim()));
    }

    None
}

/// Unpack an EPUB archive into `dest`, which must already exist.
///
/// Entry names that would escape `dest` are rejected by the zip reader.
pub fn unpack(path: &Path, dest: &Path) -> Result<()> {
    let mut archive = open_epub(path)?;
    if let Some(problem) = check_mimetype(&mut archive) {
        warn!("{}: {problem}", path.display());
    }
    debug!("unpacking {} entries into {}", archive.len(), dest.display());
    archive.extract(dest).map_err(|e| {
        EpubmarkError::Extraction(format!("cannot unpack {}: {e}", path.display()))
    })
}

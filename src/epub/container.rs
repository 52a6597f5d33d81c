use crate::error::{EpubmarkError, Result};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::path::{Path, PathBuf};

/// Fixed location of the container descriptor inside a package.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Parse META-INF/container.xml to find the OPF rootfile path
pub fn parse_container(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"rootfile" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"full-path" {
                        let path = String::from_utf8_lossy(&attr.value).trim().to_string();
                        if !path.is_empty() {
                            return Ok(path);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(EpubmarkError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Err(EpubmarkError::MalformedPackage(
        "no rootfile found in container.xml".into(),
    ))
}

/// Locate the package document of an unpacked tree.
pub fn locate_package_document(root: &Path) -> Result<PathBuf> {
    let container = root.join(CONTAINER_PATH);
    let xml = std::fs::read_to_string(&container).map_err(|e| {
        EpubmarkError::MalformedPackage(format!("cannot read {CONTAINER_PATH}: {e}"))
    })?;
    let rootfile = parse_container(&xml)?;
    Ok(root.join(rootfile))
}

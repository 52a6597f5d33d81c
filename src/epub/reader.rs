use crate::epub::{Package, container, opf};
use crate::error::{EpubmarkError, Result};
use log::{debug, warn};
use std::path::Path;

/// Read and parse an unpacked EPUB tree into a Package model
pub fn read_package(root: &Path) -> Result<Package> {
    let opf_path = container::locate_package_document(root)?;
    let opf_xml = std::fs::read_to_string(&opf_path).map_err(|e| {
        EpubmarkError::MalformedPackage(format!(
            "cannot read package document {}: {e}",
            opf_path.display()
        ))
    })?;
    let opf_data = opf::parse_opf(&opf_xml)?;
    debug!(
        "package document {}: {} manifest items, {} spine entries",
        opf_path.display(),
        opf_data.manifest.len(),
        opf_data.spine.len()
    );

    let mut warnings = Vec::new();
    let mut spine = Vec::with_capacity(opf_data.spine.len());
    for idref in opf_data.spine {
        if opf_data.manifest.iter().any(|m| m.id == idref) {
            spine.push(idref);
        } else {
            let message = format!("spine references missing manifest item: {idref}");
            warn!("{message}");
            warnings.push(message);
        }
    }

    Ok(Package {
        root: root.to_path_buf(),
        opf_path,
        metadata: opf_data.metadata,
        manifest: opf_data.manifest,
        spine,
        warnings,
    })
}

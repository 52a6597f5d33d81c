use crate::epub::{ManifestItem, PackageMetadata};
use crate::error::{EpubmarkError, Result};
use crate::util::split_href;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

pub struct OpfData {
    pub metadata: PackageMetadata,
    pub manifest: Vec<ManifestItem>,
    /// `idref`s exactly as declared, unresolved.
    pub spine: Vec<String>,
}

fn attr_value(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

fn manifest_item(e: &BytesStart<'_>) -> ManifestItem {
    let href = attr_value(e, b"href").unwrap_or_default();
    ManifestItem {
        id: attr_value(e, b"id").unwrap_or_default(),
        href: split_href(&href).0,
        media_type: attr_value(e, b"media-type").unwrap_or_default(),
        properties: attr_value(e, b"properties"),
    }
}

pub fn parse_opf(xml: &str) -> Result<OpfData> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut metadata = PackageMetadata::default();
    let mut manifest = Vec::new();
    let mut spine = Vec::new();

    let mut in_metadata = false;
    let mut current_element = String::new();
    let mut current_text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();

                if local == "metadata" {
                    in_metadata = true;
                } else if in_metadata {
                    current_element = local;
                    current_text.clear();
                } else if local == "item" {
                    manifest.push(manifest_item(e));
                } else if local == "itemref" {
                    spine.extend(attr_value(e, b"idref"));
                }
            }
            Ok(Event::End(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();

                if local == "metadata" {
                    in_metadata = false;
                } else if in_metadata && !current_text.trim().is_empty() {
                    let text = current_text.trim().to_string();
                    match current_element.as_str() {
                        "title" => metadata.titles.push(text),
                        "creator" => metadata.creators.push(text),
                        "language" => metadata.languages.push(text),
                        _ => {}
                    }
                    current_text.clear();
                    current_element.clear();
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_metadata {
                    current_text.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::Empty(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();

                if local == "item" {
                    manifest.push(manifest_item(e));
                } else if local == "itemref" {
                    spine.extend(attr_value(e, b"idref"));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(EpubmarkError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(OpfData {
        metadata,
        manifest,
        spine,
    })
}

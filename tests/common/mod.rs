#![allow(dead_code)]

use std::io::Write;
use std::path::Path;

pub const CONTAINER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

/// A manifest entry: id, href, media type, properties.
pub type Item<'a> = (&'a str, &'a str, &'a str, Option<&'a str>);

pub const XHTML: &str = "application/xhtml+xml";

/// An EPUB described file by file, written out as a directory or a zipped archive.
#[derive(Default)]
pub struct BookFixture {
    files: Vec<(String, String)>,
}

impl BookFixture {
    /// A package with the standard container pointing at `OEBPS/content.opf`.
    pub fn new() -> Self {
        Self::default().file("META-INF/container.xml", CONTAINER)
    }

    pub fn file(mut self, path: &str, content: &str) -> Self {
        self.files.retain(|(p, _)| p != path);
        self.files.push((path.to_string(), content.to_string()));
        self
    }

    /// Add `OEBPS/content.opf` with the given metadata title, manifest and spine.
    pub fn opf(self, title: Option<&str>, items: &[Item<'_>], spine: &[&str]) -> Self {
        let mut opf = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
"#,
        );
        if let Some(title) = title {
            opf.push_str(&format!("    <dc:title>{title}</dc:title>\n"));
        }
        opf.push_str("    <dc:language>en</dc:language>\n  </metadata>\n  <manifest>\n");
        for (id, href, media_type, properties) in items {
            let props = properties
                .map(|p| format!(r#" properties="{p}""#))
                .unwrap_or_default();
            opf.push_str(&format!(
                r#"    <item id="{id}" href="{href}" media-type="{media_type}"{props}/>"#
            ));
            opf.push('\n');
        }
        opf.push_str("  </manifest>\n  <spine>\n");
        for idref in spine {
            opf.push_str(&format!(r#"    <itemref idref="{idref}"/>"#));
            opf.push('\n');
        }
        opf.push_str("  </spine>\n</package>\n");
        self.file("OEBPS/content.opf", &opf)
    }

    pub fn write_dir(&self, dir: &Path) {
        for (path, content) in &self.files {
            let target = dir.join(path);
            std::fs::create_dir_all(target.parent().unwrap()).unwrap();
            std::fs::write(target, content).unwrap();
        }
    }

    pub fn write_epub(&self, path: &Path) {
        use zip::write::SimpleFileOptions;

        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        zip.start_file("mimetype", stored).unwrap();
        zip.write_all(b"application/epub+zip").unwrap();
        for (name, content) in &self.files {
            zip.start_file(name.as_str(), SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
}

/// Wrap body markup in a minimal XHTML document.
pub fn xhtml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>x</title></head>
<body>{body}</body></html>"#
    )
}

/// Navigation document listing `(label, href)` pairs as top-level entries.
pub fn nav(entries: &[(&str, &str)]) -> String {
    let items: String = entries
        .iter()
        .map(|(label, href)| format!(r#"<li><a href="{href}">{label}</a></li>"#))
        .collect();
    xhtml(&format!(
        r#"<nav epub:type="toc" xmlns:epub="http://www.idpf.org/2007/ops"><ol>{items}</ol></nav>"#
    ))
}

/// One chapter, no navigation document.
pub fn single_chapter_book() -> BookFixture {
    BookFixture::new()
        .opf(
            Some("Single"),
            &[("ch1", "text/ch1.xhtml", XHTML, None)],
            &["ch1"],
        )
        .file(
            "OEBPS/text/ch1.xhtml",
            "<h1>Title</h1><p>Hello <b>world</b>.</p>",
        )
}

/// Two chapters sharing one content file, a cover image and a navigation document.
pub fn shared_file_book() -> BookFixture {
    BookFixture::new()
        .opf(
            Some("Shared File"),
            &[
                ("nav", "nav.xhtml", XHTML, Some("nav")),
                ("book", "text/book.xhtml", XHTML, None),
                ("cover", "images/cover.jpg", "image/jpeg", None),
            ],
            &["book"],
        )
        .file(
            "OEBPS/nav.xhtml",
            &nav(&[
                ("One", "text/book.xhtml#c1"),
                ("Two", "text/book.xhtml#c2"),
            ]),
        )
        .file(
            "OEBPS/text/book.xhtml",
            &xhtml(
                r#"<h2 id="c1">One</h2><p><img src="../images/cover.jpg" alt="Cover"/></p><p>First.</p><h2 id="c2">Two</h2><p>Second <a href="../nav.xhtml">back</a>.</p><p><img src="../images/cover.jpg" alt="Again"/></p>"#,
            ),
        )
        .file("OEBPS/images/cover.jpg", "jpeg bytes")
}

mod common;

use assert_cmd::Command;
use common::{BookFixture, XHTML, nav, shared_file_book, single_chapter_book, xhtml};
use predicates::prelude::*;
use tempfile::TempDir;

fn epubmark() -> Command {
    let mut cmd = Command::cargo_bin("epubmark").unwrap();
    cmd.env_remove("EPUBMARK_MODE")
        .env_remove("EPUBMARK_IMAGES")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn single_chapter_epub_to_stdout() {
    let tmp = TempDir::new().unwrap();
    let epub = tmp.path().join("book.epub");
    single_chapter_book().write_epub(&epub);

    epubmark()
        .arg(&epub)
        .assert()
        .success()
        .stdout("# Title\n\nHello **world**.\n");
}

#[test]
fn verbose_single_mode_keeps_stdout_clean() {
    let tmp = TempDir::new().unwrap();
    let epub = tmp.path().join("book.epub");
    single_chapter_book().write_epub(&epub);

    epubmark()
        .arg(&epub)
        .arg("-v")
        .assert()
        .success()
        .stdout("# Title\n\nHello **world**.\n")
        .stderr(predicate::str::contains("1 chapters"));
}

#[test]
fn verbose_list_json_is_parseable() {
    let tmp = TempDir::new().unwrap();
    let epub = tmp.path().join("book.epub");
    shared_file_book().write_epub(&epub);

    let assert = epubmark()
        .arg(&epub)
        .args(["--list", "--json", "-v"])
        .assert()
        .success();
    let plan: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(plan["chapters"].as_array().unwrap().len(), 2);
}

#[test]
fn unpacked_directory_is_accepted() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("book");
    single_chapter_book().write_dir(&dir);

    epubmark()
        .arg(&dir)
        .args(["--mode", "single"])
        .assert()
        .success()
        .stdout("# Title\n\nHello **world**.\n");
}

#[test]
fn single_mode_writes_output_file() {
    let tmp = TempDir::new().unwrap();
    let epub = tmp.path().join("book.epub");
    shared_file_book().write_epub(&epub);
    let out = tmp.path().join("out/book.md");

    epubmark()
        .arg(&epub)
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 2 chapters"));

    let text = std::fs::read_to_string(&out).unwrap();
    assert_eq!(
        text,
        "## One\n\n![Cover](../images/cover.jpg)\n\nFirst.\n\n## Two\n\nSecond back.\n\n![Again](../images/cover.jpg)\n"
    );
}

#[test]
fn headings_flag_adds_missing_chapter_headings() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("book");
    BookFixture::new()
        .opf(
            Some("Plain"),
            &[
                ("nav", "nav.xhtml", XHTML, Some("nav")),
                ("a", "a.xhtml", XHTML, None),
                ("b", "b.xhtml", XHTML, None),
            ],
            &["a", "b"],
        )
        .file("OEBPS/nav.xhtml", &nav(&[("Alpha", "a.xhtml"), ("Beta", "b.xhtml")]))
        .file("OEBPS/a.xhtml", &xhtml("<p>first</p>"))
        .file("OEBPS/b.xhtml", &xhtml("<h1>Own</h1><p>second</p>"))
        .write_dir(&dir);

    epubmark()
        .arg(&dir)
        .arg("--headings")
        .assert()
        .success()
        .stdout("# Alpha\n\nfirst\n\n# Own\n\nsecond\n");
}

#[test]
fn split_mode_with_images() {
    let tmp = TempDir::new().unwrap();
    let epub = tmp.path().join("book.epub");
    shared_file_book().write_epub(&epub);

    epubmark()
        .arg(&epub)
        .args(["--mode", "split", "--images"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 2 chapters"))
        .stdout(predicate::str::contains("Copied 1 images"));

    let dir = tmp.path().join("shared-file");
    assert_eq!(
        std::fs::read_to_string(dir.join("01-One.md")).unwrap(),
        "## One\n\n![Cover](images/cover.jpg)\n\nFirst.\n"
    );
    assert_eq!(
        std::fs::read_to_string(dir.join("02-Two.md")).unwrap(),
        "## Two\n\nSecond back.\n\n![Again](images/cover.jpg)\n"
    );
    assert_eq!(
        std::fs::read_to_string(dir.join("images/cover.jpg")).unwrap(),
        "jpeg bytes"
    );
}

#[test]
fn split_mode_from_environment_with_explicit_folder() {
    let tmp = TempDir::new().unwrap();
    let epub = tmp.path().join("book.epub");
    shared_file_book().write_epub(&epub);

    epubmark()
        .env("EPUBMARK_MODE", "split")
        .arg(&epub)
        .args(["--folder", "chapters", "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let dir = tmp.path().join("chapters");
    assert!(dir.join("01-One.md").exists());
    assert!(dir.join("02-Two.md").exists());
    assert!(!dir.join("images").exists());
}

#[test]
fn split_mode_json_summary() {
    let tmp = TempDir::new().unwrap();
    let epub = tmp.path().join("book.epub");
    shared_file_book().write_epub(&epub);
    let out = tmp.path().join("parts");

    let assert = epubmark()
        .arg(&epub)
        .args(["--mode", "split", "--json", "-o"])
        .arg(&out)
        .assert()
        .success();

    let summary: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(summary["mode"], "split");
    assert_eq!(summary["chapters"], 2);
    assert_eq!(summary["images"], 0);
    assert!(out.join("01-One.md").exists());
}

#[test]
fn list_shared_file_chapters_as_json() {
    let tmp = TempDir::new().unwrap();
    let epub = tmp.path().join("book.epub");
    shared_file_book().write_epub(&epub);

    let assert = epubmark()
        .arg(&epub)
        .args(["--list", "--json"])
        .assert()
        .success();

    let plan: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(plan["title"], "Shared File");
    assert_eq!(plan["mode"], "navigation");
    let chapters = plan["chapters"].as_array().unwrap();
    assert_eq!(chapters.len(), 2);
    assert_eq!(chapters[0]["label"], "One");
    assert_eq!(chapters[1]["label"], "Two");
    assert_eq!(chapters[0]["source"], "OEBPS/text/book.xhtml");
    assert_eq!(chapters[0]["end"], chapters[1]["start"]);
}

#[test]
fn list_as_table() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("book");
    shared_file_book().write_dir(&dir);

    epubmark()
        .arg(&dir)
        .arg("--list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Label"))
        .stdout(predicate::str::contains("One"))
        .stdout(predicate::str::contains("OEBPS/text/book.xhtml"));
}

#[test]
fn missing_spine_item_warns_and_keeps_order() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("book");
    BookFixture::new()
        .opf(
            None,
            &[
                ("ch1", "ch1.xhtml", XHTML, None),
                ("ch3", "ch3.xhtml", XHTML, None),
            ],
            &["ch1", "ghost", "ch3"],
        )
        .file("OEBPS/ch1.xhtml", &xhtml("<p>one</p>"))
        .file("OEBPS/ch3.xhtml", &xhtml("<p>three</p>"))
        .write_dir(&dir);

    epubmark()
        .arg(&dir)
        .assert()
        .success()
        .stdout("one\n\nthree\n")
        .stderr(predicate::str::contains("ghost"));
}

#[test]
fn empty_spine_without_navigation_fails() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("book");
    BookFixture::new().opf(Some("Empty"), &[], &[]).write_dir(&dir);
    let out = tmp.path().join("out.md");

    epubmark()
        .arg(&dir)
        .arg("-o")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no chapters found"));
    assert!(!out.exists());
}

#[test]
fn missing_container_fails() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("book");
    std::fs::create_dir_all(&dir).unwrap();

    epubmark()
        .arg(&dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("META-INF/container.xml"));
}

#[test]
fn nonexistent_input_fails() {
    epubmark().arg("nonexistent.epub").assert().failure();
}

#[test]
fn ncx_navigation_is_used_without_nav_document() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("book");
    BookFixture::new()
        .opf(
            Some("Old"),
            &[
                ("ncx", "toc.ncx", "application/x-dtbncx+xml", None),
                ("a", "a.xhtml", XHTML, None),
            ],
            &["a"],
        )
        .file(
            "OEBPS/toc.ncx",
            r#"<?xml version="1.0"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1"><navMap>
  <navPoint id="p1" playOrder="1"><navLabel><text>Opening</text></navLabel><content src="a.xhtml#s1"/>
    <navPoint id="p2" playOrder="2"><navLabel><text>Nested</text></navLabel><content src="a.xhtml#s2"/></navPoint>
  </navPoint>
  <navPoint id="p3" playOrder="3"><navLabel><text>Closing</text></navLabel><content src="a.xhtml#s3"/></navPoint>
</navMap></ncx>"#,
        )
        .file(
            "OEBPS/a.xhtml",
            &xhtml(r#"<h1 id="s1">Opening</h1><h2 id="s2">Nested</h2><p>x</p><h1 id="s3">Closing</h1><p>y</p>"#),
        )
        .write_dir(&dir);

    let assert = epubmark()
        .arg(&dir)
        .args(["--list", "--json"])
        .assert()
        .success();
    let plan: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    let labels: Vec<&str> = plan["chapters"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["Opening", "Closing"]);
}

#[test]
fn spine_fallback_labels_are_file_names() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("book");
    BookFixture::new()
        .opf(
            None,
            &[
                ("a", "text/intro.xhtml", XHTML, None),
                ("b", "text/body.xhtml", XHTML, None),
            ],
            &["a", "b"],
        )
        .file("OEBPS/text/intro.xhtml", &xhtml("<p>hi</p>"))
        .file("OEBPS/text/body.xhtml", &xhtml("<p>there</p>"))
        .write_dir(&dir);

    let out = tmp.path().join("split");
    epubmark()
        .arg(&dir)
        .args(["--mode", "split", "-o"])
        .arg(&out)
        .assert()
        .success();

    assert!(out.join("01-intro.xhtml.md").exists());
    assert_eq!(
        std::fs::read_to_string(out.join("02-body.xhtml.md")).unwrap(),
        "# body.xhtml\n\nthere\n"
    );
}

#[test]
fn malformed_ncx_falls_back_to_spine() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("book");
    BookFixture::new()
        .opf(
            Some("Broken"),
            &[
                ("ncx", "toc.ncx", "application/x-dtbncx+xml", None),
                ("a", "a.xhtml", XHTML, None),
            ],
            &["a"],
        )
        .file(
            "OEBPS/toc.ncx",
            r#"<ncx><navMap><navPoint id="p1"><navLabel><text>A</text></navLabel><content src="a.xhtml"/></navPoint></navMapp></ncx>"#,
        )
        .file("OEBPS/a.xhtml", &xhtml("<p>still here</p>"))
        .write_dir(&dir);

    epubmark()
        .arg(&dir)
        .assert()
        .success()
        .stdout("still here\n")
        .stderr(predicate::str::contains("malformed"));
}

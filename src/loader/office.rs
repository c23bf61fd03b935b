//! Office Open XML extraction (DOCX and PPTX).
//!
//! Both formats are ZIP archives of XML parts. Word text lives in `w:t`
//! runs of `word/document.xml`; slide text lives in `a:t` runs of
//! `ppt/slides/slideN.xml`.

use crate::error::{RagError, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Extract DOCX text, split into pages at explicit and rendered page breaks.
pub fn extract_docx_pages(path: &Path) -> Result<Vec<String>> {
    let mut archive = open_archive(path)?;
    let xml = read_part(&mut archive, "word/document.xml")
        .map_err(|reason| RagError::extraction(path, reason))?;
    parse_docx_xml(&xml).map_err(|reason| RagError::extraction(path, reason))
}

/// Extract PPTX text. Entry `N - 1` holds the text of `slideN.xml`;
/// numbers with no slide part are left blank.
pub fn extract_pptx_slides(path: &Path) -> Result<Vec<String>> {
    let mut archive = open_archive(path)?;

    let mut slides: Vec<(usize, String)> = archive
        .file_names()
        .filter_map(|name| slide_number(name).map(|n| (n, name.to_string())))
        .collect();
    slides.sort_by_key(|(n, _)| *n);

    if slides.is_empty() {
        return Err(RagError::extraction(path, "no slides found in archive"));
    }

    let last = slides.last().map_or(0, |(n, _)| *n);
    let mut pages = vec![String::new(); last];
    for (n, name) in slides {
        let xml = read_part(&mut archive, &name).map_err(|reason| RagError::extraction(path, reason))?;
        pages[n - 1] = parse_slide_xml(&xml).map_err(|reason| RagError::extraction(path, reason))?;
    }

    Ok(pages)
}

fn open_archive(path: &Path) -> Result<zip::ZipArchive<File>> {
    let file = File::open(path).map_err(|e| RagError::io(path, e))?;
    zip::ZipArchive::new(file)
        .map_err(|e| RagError::extraction(path, format!("invalid archive: {}", e)))
}

fn read_part(archive: &mut zip::ZipArchive<File>, name: &str) -> std::result::Result<String, String> {
    let mut part = archive
        .by_name(name)
        .map_err(|_| format!("missing part {}", name))?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| format!("failed to read {}: {}", name, e))?;
    Ok(xml)
}

/// `ppt/slides/slide12.xml` -> 12
fn slide_number(name: &str) -> Option<usize> {
    name.strip_prefix("ppt/slides/slide")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
        .filter(|n| *n > 0)
}

fn is_page_break(e: &BytesStart) -> bool {
    e.attributes().flatten().any(|attr| {
        attr.key.as_ref() == b"w:type" && &*attr.value == b"page"
    })
}

fn parse_docx_xml(xml: &str) -> std::result::Result<Vec<String>, String> {
    let mut reader = Reader::from_str(xml);
    let mut pages = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text = true,
                b"w:lastRenderedPageBreak" => start_page(&mut pages, &mut current),
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"w:br" if is_page_break(e) => start_page(&mut pages, &mut current),
                b"w:br" | b"w:p" => current.push('\n'),
                b"w:tab" => current.push('\t'),
                b"w:lastRenderedPageBreak" => start_page(&mut pages, &mut current),
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_text => {
                let text = e.unescape().map_err(|e| format!("bad text run: {}", e))?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML error at {}: {}", reader.buffer_position(), e)),
            _ => {}
        }
        buf.clear();
    }

    pages.push(current);
    Ok(pages)
}

/// Close the current page unless it is still blank, so a rendered break
/// right after an explicit one does not create an empty page.
fn start_page(pages: &mut Vec<String>, current: &mut String) {
    if !current.trim().is_empty() {
        pages.push(std::mem::take(current));
    }
}

fn parse_slide_xml(xml: &str) -> std::result::Result<String, String> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_text = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"a:t" => in_text = true,
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"a:t" => in_text = false,
                b"a:p" => {
                    if !text.is_empty() && !text.ends_with('\n') {
                        text.push('\n');
                    }
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_text => {
                let run = e.unescape().map_err(|e| format!("bad text run: {}", e))?;
                text.push_str(&run);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML error at {}: {}", reader.buffer_position(), e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;

    pub(crate) fn write_zip(path: &Path, parts: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, content) in parts {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    const DOCX_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t>Chapter 1</w:t></w:r></w:p>
<w:p><w:r><w:t xml:space="preserve">Dialectics &amp; </w:t></w:r><w:r><w:t>practice</w:t></w:r></w:p>
<w:p><w:r><w:br w:type="page"/></w:r></w:p>
<w:p><w:r><w:lastRenderedPageBreak/><w:t>Chapter 2</w:t></w:r></w:p>
</w:body></w:document>"#;

    #[test]
    fn test_parse_docx_pages() {
        let pages = parse_docx_xml(DOCX_XML).unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].contains("Chapter 1"));
        assert!(pages[0].contains("Dialectics & practice"));
        assert!(pages[1].contains("Chapter 2"));
    }

    #[test]
    fn test_slide_number() {
        assert_eq!(slide_number("ppt/slides/slide3.xml"), Some(3));
        assert_eq!(slide_number("ppt/slides/slide12.xml"), Some(12));
        assert_eq!(slide_number("ppt/slides/_rels/slide3.xml.rels"), None);
        assert_eq!(slide_number("ppt/slideLayouts/slideLayout1.xml"), None);
        assert_eq!(slide_number("ppt/slides/slide0.xml"), None);
    }

    #[test]
    fn test_pptx_slides_keep_file_numbers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deck.pptx");
        let slide = |text: &str| {
            format!(
                r#"<p:sld xmlns:a="a" xmlns:p="p"><p:cSld><p:spTree><p:sp><p:txBody><a:p><a:r><a:t>{}</a:t></a:r></a:p><a:p><a:r><a:t>body</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#,
                text
            )
        };
        let s1 = slide("Intro");
        let s2 = slide("Second");
        let s10 = slide("Tenth");
        write_zip(
            &path,
            &[
                ("ppt/slides/slide10.xml", s10.as_str()),
                ("ppt/slides/slide2.xml", s2.as_str()),
                ("ppt/slides/slide1.xml", s1.as_str()),
            ],
        );

        let slides = extract_pptx_slides(&path).unwrap();
        assert_eq!(slides.len(), 10);
        assert!(slides[0].starts_with("Intro\nbody"));
        assert!(slides[1].starts_with("Second"));
        assert!(slides[2..9].iter().all(|s| s.is_empty()));
        assert!(slides[9].starts_with("Tenth"));

        let doc = crate::loader::load_document(&path).unwrap();
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.pages[2].number, 10);
        assert!(doc.get_page(10).unwrap().content.starts_with("Tenth"));
    }

    #[test]
    fn test_docx_from_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.docx");
        write_zip(&path, &[("word/document.xml", DOCX_XML)]);

        let pages = extract_docx_pages(&path).unwrap();
        assert_eq!(pages.len(), 2);
    }

    #[test]
    fn test_docx_without_document_part() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.docx");
        write_zip(&path, &[("other.xml", "<x/>")]);

        assert!(matches!(
            extract_docx_pages(&path),
            Err(RagError::Extraction { .. })
        ));
    }
}

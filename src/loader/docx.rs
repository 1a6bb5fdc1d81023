//! Word (Office Open XML) loader.

use super::{DocumentFormat, DocumentLoader, LoadedDocument};
use crate::error::{ParleyError, Result};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::io::Read;
use std::path::Path;

/// Reads paragraph text from `word/document.xml`.
///
/// Legacy binary `.doc` files are not zip archives and fail to load.
pub struct DocxLoader;

impl DocumentLoader for DocxLoader {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    fn load(&self, path: &Path, source: &str) -> Result<Vec<LoadedDocument>> {
        let file = std::fs::File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| ParleyError::Loader(format!("{}: not a Word document ({})", source, e)))?;

        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .map_err(|e| ParleyError::Loader(format!("{}: {}", source, e)))?
            .read_to_string(&mut xml)?;

        let content = extract_paragraphs(&xml)
            .map_err(|e| ParleyError::Loader(format!("{}: {}", source, e)))?;

        Ok(vec![LoadedDocument::new(source, None, content)])
    }
}

/// Plain text of a WordprocessingML body, one line per paragraph.
fn extract_paragraphs(xml: &str) -> std::result::Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    paragraphs.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" | b"w:cr" => current.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => current.push_str(&t.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }

    Ok(paragraphs.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BODY: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Quarterly</w:t></w:r><w:r><w:t xml:space="preserve"> report</w:t></w:r></w:p>
    <w:p><w:r><w:t>Revenue</w:t><w:tab/><w:t>R&amp;D</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

    #[test]
    fn test_extract_paragraphs() {
        let text = extract_paragraphs(BODY).unwrap();
        assert_eq!(text, "Quarterly report\nRevenue\tR&D");
    }

    #[test]
    fn test_load_docx_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.docx");

        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(BODY.as_bytes()).unwrap();
        zip.finish().unwrap();

        let docs = DocxLoader.load(&path, "report.docx").unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].content.starts_with("Quarterly report"));
    }

    #[test]
    fn test_archive_without_body_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.docx");

        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("other.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<x/>").unwrap();
        zip.finish().unwrap();

        assert!(matches!(
            DocxLoader.load(&path, "empty.docx"),
            Err(ParleyError::Loader(_))
        ));
    }
}

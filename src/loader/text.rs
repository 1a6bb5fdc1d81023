//! Plain-text loader with encoding detection.

use super::{DocumentFormat, DocumentLoader, LoadedDocument};
use crate::error::{ParleyError, Result};
use std::path::Path;
use tracing::debug;

/// Loads `.txt` files as a single document.
pub struct TextLoader;

impl DocumentLoader for TextLoader {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Text
    }

    fn load(&self, path: &Path, source: &str) -> Result<Vec<LoadedDocument>> {
        let bytes = std::fs::read(path)?;
        let content = decode_text(&bytes)
            .map_err(|e| ParleyError::Loader(format!("{}: {}", source, e)))?;
        Ok(vec![LoadedDocument::new(source, None, content)])
    }
}

/// Decode bytes by BOM, then as UTF-8, falling back to a detected encoding.
pub fn decode_text(bytes: &[u8]) -> Result<String> {
    // chardetng never guesses UTF-16, so Windows exports are only recognised by their BOM.
    if let Some((encoding, bom_len)) = encoding_rs::Encoding::for_bom(bytes) {
        debug!("Found {} byte order mark", encoding.name());
        let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        if had_errors {
            return Err(ParleyError::Loader(format!("could not decode text as {}", encoding.name())));
        }
        return Ok(text.into_owned());
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(text.strip_prefix('\u{feff}').unwrap_or(text).to_string());
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    debug!("Text is not UTF-8, detected {}", encoding.name());

    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(ParleyError::Loader(format!(
            "could not decode text (tried UTF-8 and {})",
            encoding.name()
        )));
    }
    Ok(text.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_passes_through() {
        assert_eq!(decode_text("안녕하세요".as_bytes()).unwrap(), "안녕하세요");
    }

    #[test]
    fn test_bom_is_stripped() {
        assert_eq!(decode_text(b"\xef\xbb\xbfhello").unwrap(), "hello");
    }

    #[test]
    fn test_utf16_with_bom() {
        let mut bytes = vec![0xff, 0xfe];
        for unit in "[Kim] [1] hi".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_text(&bytes).unwrap(), "[Kim] [1] hi");
    }

    #[test]
    fn test_legacy_encoding_fallback() {
        let (bytes, _, _) = encoding_rs::WINDOWS_1252
            .encode("Le café est très bon, et la crème brûlée est déjà prête à côté.");
        assert!(std::str::from_utf8(&bytes).is_err());

        let text = decode_text(&bytes).unwrap();
        assert!(text.contains("café"));
    }

    #[test]
    fn test_loader_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "line one\nline two").unwrap();

        let docs = TextLoader.load(&path, "a.txt").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "line one\nline two");
    }
}

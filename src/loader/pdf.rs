//! PDF loader: one document per page.

use super::{DocumentFormat, DocumentLoader, LoadedDocument};
use crate::error::{ParleyError, Result};
use std::path::Path;
use tracing::warn;

/// Extracts the text layer of each page. Scanned pages without text are skipped.
pub struct PdfLoader;

impl DocumentLoader for PdfLoader {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn load(&self, path: &Path, source: &str) -> Result<Vec<LoadedDocument>> {
        let document = lopdf::Document::load(path)
            .map_err(|e| ParleyError::Loader(format!("{}: {}", source, e)))?;

        if document.is_encrypted() {
            return Err(ParleyError::Loader(format!("{}: PDF is encrypted", source)));
        }

        let mut documents = Vec::new();
        for page_number in document.get_pages().into_keys() {
            match document.extract_text(&[page_number]) {
                Ok(text) if !text.trim().is_empty() => documents.push(LoadedDocument::new(
                    source,
                    Some(format!("page {}", page_number)),
                    text,
                )),
                Ok(_) => {}
                Err(e) => warn!("Skipping page {} of {}: {}", page_number, source, e),
            }
        }

        Ok(documents)
    }
}

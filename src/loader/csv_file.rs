//! CSV loader: one document per row.

use super::{DocumentFormat, DocumentLoader, LoadedDocument};
use crate::error::{ParleyError, Result};
use std::path::Path;

/// Renders each row as `header: value` lines.
pub struct CsvLoader;

impl DocumentLoader for CsvLoader {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Csv
    }

    fn load(&self, path: &Path, source: &str) -> Result<Vec<LoadedDocument>> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| ParleyError::Loader(format!("{}: {}", source, e)))?;

        let headers = reader
            .headers()
            .map_err(|e| ParleyError::Loader(format!("{}: {}", source, e)))?
            .clone();

        let mut documents = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|e| ParleyError::Loader(format!("{}: {}", source, e)))?;

            let content = headers
                .iter()
                .zip(record.iter())
                .map(|(header, value)| format!("{}: {}", header.trim(), value.trim()))
                .collect::<Vec<_>>()
                .join("\n");

            if !content.trim().is_empty() {
                documents.push(LoadedDocument::new(source, Some(format!("row {}", row)), content));
            }
        }

        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_become_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.csv");
        std::fs::write(&path, "name,city\nAda,London\nGrace, New York\n").unwrap();

        let docs = CsvLoader.load(&path, "people.csv").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content, "name: Ada\ncity: London");
        assert_eq!(docs[0].location.as_deref(), Some("row 0"));
        assert_eq!(docs[1].content, "name: Grace\ncity: New York");
    }

    #[test]
    fn test_short_rows_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragged.csv");
        std::fs::write(&path, "a,b,c\n1,2\n").unwrap();

        let docs = CsvLoader.load(&path, "ragged.csv").unwrap();
        assert_eq!(docs[0].content, "a: 1\nb: 2");
    }
}

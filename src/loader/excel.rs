//! Excel loader (`.xlsx`, `.xls`): one document per sheet.

use super::{DocumentFormat, DocumentLoader, LoadedDocument};
use crate::error::{ParleyError, Result};
use calamine::{open_workbook_auto, Reader};
use std::path::Path;
use tracing::warn;

pub struct ExcelLoader;

impl DocumentLoader for ExcelLoader {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Excel
    }

    fn load(&self, path: &Path, source: &str) -> Result<Vec<LoadedDocument>> {
        let mut workbook = open_workbook_auto(path)
            .map_err(|e| ParleyError::Loader(format!("{}: {}", source, e)))?;

        let mut documents = Vec::new();
        for sheet in workbook.sheet_names() {
            let range = match workbook.worksheet_range(&sheet) {
                Ok(range) => range,
                Err(e) => {
                    warn!("Skipping sheet '{}' in {}: {}", sheet, source, e);
                    continue;
                }
            };

            let content = range
                .rows()
                .map(|row| {
                    row.iter()
                        .map(|cell| cell.to_string())
                        .collect::<Vec<_>>()
                        .join("\t")
                        .trim_end()
                        .to_string()
                })
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("\n");

            if !content.is_empty() {
                documents.push(LoadedDocument::new(source, Some(format!("sheet {}", sheet)), content));
            }
        }

        Ok(documents)
    }
}

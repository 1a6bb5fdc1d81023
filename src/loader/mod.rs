//! Document loaders for uploaded files.
//!
//! Each supported format has a loader chosen by file extension. Loaders are
//! blocking and read from a path; uploads are written to a temporary file
//! first, which is removed once loading finishes.

mod csv_file;
mod docx;
mod excel;
mod pdf;
mod text;

pub use csv_file::CsvLoader;
pub use docx::DocxLoader;
pub use excel::ExcelLoader;
pub use pdf::PdfLoader;
pub use text::{decode_text, TextLoader};

use crate::error::{ParleyError, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::{debug, instrument};

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Csv,
    Excel,
    Text,
}

impl DocumentFormat {
    /// Detect the format from a file name or path.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" | "doc" => Some(DocumentFormat::Docx),
            "csv" => Some(DocumentFormat::Csv),
            "xlsx" | "xls" => Some(DocumentFormat::Excel),
            "txt" => Some(DocumentFormat::Text),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentFormat::Pdf => write!(f, "pdf"),
            DocumentFormat::Docx => write!(f, "docx"),
            DocumentFormat::Csv => write!(f, "csv"),
            DocumentFormat::Excel => write!(f, "excel"),
            DocumentFormat::Text => write!(f, "text"),
        }
    }
}

/// Text extracted from one part of a file (a page, a row, a sheet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedDocument {
    /// Name of the file this came from.
    pub source: String,
    /// Where in the file, e.g. "page 3" or "row 12".
    pub location: Option<String>,
    pub content: String,
}

impl LoadedDocument {
    pub fn new(source: impl Into<String>, location: Option<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            location,
            content: content.into(),
        }
    }
}

/// Trait for file loaders.
pub trait DocumentLoader: Send + Sync {
    /// The format this loader reads.
    fn format(&self) -> DocumentFormat;

    /// Extract documents from the file at `path`, labelled with `source`.
    fn load(&self, path: &Path, source: &str) -> Result<Vec<LoadedDocument>>;
}

/// Pick the loader for a file name.
pub fn loader_for(name: &str) -> Result<Box<dyn DocumentLoader>> {
    let format = DocumentFormat::from_path(Path::new(name))
        .ok_or_else(|| ParleyError::UnsupportedFormat(name.to_string()))?;

    Ok(match format {
        DocumentFormat::Pdf => Box::new(PdfLoader),
        DocumentFormat::Docx => Box::new(DocxLoader),
        DocumentFormat::Csv => Box::new(CsvLoader),
        DocumentFormat::Excel => Box::new(ExcelLoader),
        DocumentFormat::Text => Box::new(TextLoader),
    })
}

/// Load a file from disk.
pub fn load_path(path: &Path) -> Result<Vec<LoadedDocument>> {
    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document")
        .to_string();
    let loader = loader_for(&source)?;
    loader.load(path, &source)
}

/// Load uploaded bytes by spilling them to a temporary file.
#[instrument(skip(bytes), fields(size = bytes.len()))]
pub fn load_upload(name: &str, bytes: &[u8], temp_dir: &Path) -> Result<Vec<LoadedDocument>> {
    let loader = loader_for(name)?;

    std::fs::create_dir_all(temp_dir)?;
    let mut temp_file = tempfile::NamedTempFile::new_in(temp_dir)?;
    temp_file.write_all(bytes)?;
    temp_file.flush()?;

    let documents = loader.load(temp_file.path(), name)?;
    debug!("Loaded {} documents from {} ({})", documents.len(), name, loader.format());
    Ok(documents)
}

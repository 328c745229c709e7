//! Document Text Extractor: turns uploaded resume bytes into plain text.
//!
//! PDF goes through `pdf-extract`, DOCX through the OOXML reader in `docx`,
//! and `.txt` uploads are decoded as UTF-8. Extraction is CPU-bound, so
//! `extract_document` runs it on the blocking pool.

use serde::Serialize;
use thiserror::Error;

mod docx;

/// Upload formats the screener can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    PlainText,
}

impl DocumentFormat {
    /// Detects the format from the file extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Result<Self, ExtractionError> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::Docx),
            "txt" => Ok(DocumentFormat::PlainText),
            _ => Err(ExtractionError::UnsupportedFormat(if extension.is_empty() {
                filename.to_string()
            } else {
                extension
            })),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Could not read file: {0}")]
    CorruptFile(String),

    #[error("No text could be extracted from the file")]
    Empty,
}

/// Extracts plain text from `bytes` in the given format.
/// Text that is empty after trimming is reported as `ExtractionError::Empty`.
pub fn extract_text(bytes: &[u8], format: DocumentFormat) -> Result<String, ExtractionError> {
    let text = match format {
        DocumentFormat::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ExtractionError::CorruptFile(format!("PDF extraction error: {e}")))?,
        DocumentFormat::Docx => docx::extract_docx_text(bytes)?,
        DocumentFormat::PlainText => String::from_utf8(bytes.to_vec())
            .map_err(|e| ExtractionError::CorruptFile(format!("Invalid UTF-8 text: {e}")))?,
    };

    if text.trim().is_empty() {
        return Err(ExtractionError::Empty);
    }
    Ok(text)
}

/// Detects the format of an upload and extracts it off the async runtime.
/// A panic inside the PDF library is reported as a corrupt file.
pub async fn extract_document(
    filename: &str,
    bytes: bytes::Bytes,
) -> Result<String, ExtractionError> {
    let format = DocumentFormat::from_filename(filename)?;
    tokio::task::spawn_blocking(move || extract_text(&bytes, format))
        .await
        .map_err(|e| ExtractionError::CorruptFile(format!("Extraction aborted: {e}")))?
}

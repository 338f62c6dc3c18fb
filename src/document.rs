//! Uploaded documents and the document-to-text collaborator
//!
//! Turning a binary document into text sits behind [`TextExtractor`] so a real
//! PDF reader can be injected. The shipped `PlaceholderExtractor` ignores the
//! bytes and returns a fixed sample passage.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// MIME type accepted for uploads
pub const PDF_MIME: &str = "application/pdf";

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Errors from upload validation and text extraction
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DocumentError {
    #[error("not a PDF document: {0}")]
    NotPdf(String),

    #[error("text extraction failed: {0}")]
    ExtractionFailed(String),
}

/// A file handed in by the user
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    /// Declared MIME type, if the client sent one
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        }
    }

    /// Accept only PDF uploads.
    ///
    /// A declared content type decides on its own. Without one, the file name
    /// extension or the `%PDF-` signature is enough.
    pub fn ensure_pdf(&self) -> Result<(), DocumentError> {
        // Parameters such as `; name=x.pdf` do not change the media type.
        let essence = self
            .content_type
            .as_deref()
            .map(|ct| ct.split_once(';').map_or(ct, |(essence, _)| essence).trim());
        let accepted = match essence {
            Some(ct) if !ct.is_empty() => ct.eq_ignore_ascii_case(PDF_MIME),
            _ => {
                self.file_name.to_lowercase().ends_with(".pdf")
                    || self.bytes.starts_with(PDF_MAGIC)
            }
        };
        if accepted {
            Ok(())
        } else {
            Err(DocumentError::NotPdf(self.file_name.clone()))
        }
    }
}

/// Bytes in, text out.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, DocumentError>;
}

/// Sample passage returned by [`PlaceholderExtractor`]
pub const PLACEHOLDER_TEXT: &str = "Sample medical text about cardiovascular system, including heart anatomy, blood circulation, and cardiac physiology.";

/// Stand-in extractor: returns [`PLACEHOLDER_TEXT`] for any input.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderExtractor;

impl TextExtractor for PlaceholderExtractor {
    fn extract_text(&self, _bytes: &[u8]) -> Result<String, DocumentError> {
        Ok(PLACEHOLDER_TEXT.to_string())
    }
}

/// Decodes the bytes as UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Extractor;

impl TextExtractor for Utf8Extractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, DocumentError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| DocumentError::ExtractionFailed(format!("not UTF-8 text: {}", e)))?;
        if text.trim().is_empty() {
            return Err(DocumentError::ExtractionFailed(
                "document contains no text".to_string(),
            ));
        }
        Ok(text.to_string())
    }
}

/// Which extractor to use, as named in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    #[default]
    Placeholder,
    Utf8,
}

impl ExtractorKind {
    pub fn build(self) -> Box<dyn TextExtractor> {
        match self {
            Self::Placeholder => Box::new(PlaceholderExtractor),
            Self::Utf8 => Box::new(Utf8Extractor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_pdf_is_accepted() {
        let upload = Upload::new("notes", Some("application/pdf".to_string()), vec![]);
        assert!(upload.ensure_pdf().is_ok());
    }

    #[test]
    fn declared_pdf_with_parameters_is_accepted() {
        let upload = Upload::new(
            "notes",
            Some("Application/PDF; name=notes.pdf".to_string()),
            vec![],
        );
        assert!(upload.ensure_pdf().is_ok());
        let upload = Upload::new("notes.pdf", Some("text/plain; charset=utf-8".to_string()), vec![]);
        assert!(upload.ensure_pdf().is_err());
    }

    #[test]
    fn declared_non_pdf_is_rejected_even_with_pdf_name() {
        let upload = Upload::new("notes.pdf", Some("image/png".to_string()), b"%PDF-1.7".to_vec());
        assert_eq!(
            upload.ensure_pdf(),
            Err(DocumentError::NotPdf("notes.pdf".to_string()))
        );
    }

    #[test]
    fn undeclared_type_falls_back_to_name_or_signature() {
        assert!(Upload::new("a.PDF", None, vec![]).ensure_pdf().is_ok());
        assert!(Upload::new("blob", None, b"%PDF-1.4\n".to_vec()).ensure_pdf().is_ok());
        assert!(Upload::new("notes.txt", None, b"hello".to_vec()).ensure_pdf().is_err());
    }

    #[test]
    fn placeholder_ignores_content() {
        let text = PlaceholderExtractor.extract_text(b"%PDF-1.7 anything").unwrap();
        assert_eq!(text, PLACEHOLDER_TEXT);
    }

    #[test]
    fn utf8_extractor_rejects_binary_and_empty() {
        assert!(Utf8Extractor.extract_text(&[0xff, 0xfe, 0x00]).is_err());
        assert!(Utf8Extractor.extract_text(b"  \n").is_err());
        assert_eq!(Utf8Extractor.extract_text(b"Aortic stenosis").unwrap(), "Aortic stenosis");
    }
}

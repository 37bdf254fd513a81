//! Text extraction: pull the embedded text layer out of every page via pdfium.
//!
//! pdfium is a blocking C library, so every call runs inside
//! `tokio::task::spawn_blocking`; the async wrappers add the extraction
//! timeout on top.

use crate::error::LeaseAiError;
use crate::models::LeaseInfo;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Bind to the pdfium library cached by `pdfium-auto`.
pub(crate) fn bind_pdfium() -> Result<Pdfium, LeaseAiError> {
    pdfium_auto::bind_pdfium_silent().map_err(|e| LeaseAiError::PdfiumBindingFailed(e.to_string()))
}

/// Extract the text of every page, in order. Pages whose text layer cannot
/// be read yield an empty string.
pub async fn extract_pages(bytes: Vec<u8>) -> Result<Vec<String>, LeaseAiError> {
    tokio::task::spawn_blocking(move || extract_pages_blocking(&bytes))
        .await
        .map_err(|e| LeaseAiError::Internal(format!("Text extraction task panicked: {e}")))?
}

/// [`extract_pages`] bounded by `timeout`.
pub async fn extract_pages_with_timeout(
    bytes: Vec<u8>,
    timeout: Duration,
) -> Result<Vec<String>, LeaseAiError> {
    tokio::time::timeout(timeout, extract_pages(bytes))
        .await
        .map_err(|_| LeaseAiError::PdfTimeout {
            secs: timeout.as_secs(),
        })?
}

/// Supplies page text for an uploaded PDF.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn pages(&self, bytes: Vec<u8>, timeout: Duration) -> Result<Vec<String>, LeaseAiError>;
}

/// The pdfium text layer.
pub struct PdfiumText;

#[async_trait]
impl PageSource for PdfiumText {
    async fn pages(&self, bytes: Vec<u8>, timeout: Duration) -> Result<Vec<String>, LeaseAiError> {
        extract_pages_with_timeout(bytes, timeout).await
    }
}

/// Whole-document text for the analysis endpoints.
///
/// Only `full_text` is filled here; the other fields come from the regex
/// parser and the model.
pub fn lease_text(pages: &[String]) -> Result<LeaseInfo, LeaseAiError> {
    let full_text = join_pages(pages);
    if full_text.trim().is_empty() {
        return Err(LeaseAiError::EmptyPdf);
    }
    Ok(LeaseInfo {
        full_text,
        ..LeaseInfo::default()
    })
}

/// Non-empty page texts joined by a blank line.
pub fn join_pages(pages: &[String]) -> String {
    pages
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn extract_pages_blocking(bytes: &[u8]) -> Result<Vec<String>, LeaseAiError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| classify_load_error(&format!("{e:?}")))?;

    let pages = document.pages();
    let total = pages.len() as usize;
    if total == 0 {
        return Err(LeaseAiError::PdfExtraction {
            message: "PDF file has no pages".into(),
            details: Some("The PDF appears to be empty or corrupted".into()),
        });
    }
    info!("PDF loaded: {} pages", total);

    let mut texts = Vec::with_capacity(total);
    for (idx, page) in pages.iter().enumerate() {
        match page.text() {
            Ok(text) => {
                let t = text.all();
                debug!("Page {}: {} chars", idx + 1, t.len());
                texts.push(t);
            }
            Err(e) => {
                warn!("Failed to extract text from page {}: {:?}", idx + 1, e);
                texts.push(String::new());
            }
        }
    }
    Ok(texts)
}

/// Map a pdfium load failure onto a user-facing extraction error.
pub(crate) fn classify_load_error(detail: &str) -> LeaseAiError {
    let lower = detail.to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") || lower.contains("security") {
        LeaseAiError::PdfExtraction {
            message: "PDF is password-protected".into(),
            details: Some("This PDF requires a password to open".into()),
        }
    } else if lower.contains("format") || lower.contains("corrupt") || lower.contains("damaged") {
        LeaseAiError::PdfExtraction {
            message: "PDF file is corrupted".into(),
            details: Some("The PDF file appears to be damaged or incomplete".into()),
        }
    } else {
        LeaseAiError::PdfExtraction {
            message: "Failed to read PDF file".into(),
            details: Some(format!("Error: {detail}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_skips_blank_pages() {
        let pages = vec!["Page one".to_string(), "  ".to_string(), "Page three".to_string()];
        assert_eq!(join_pages(&pages), "Page one\n\nPage three");
    }

    #[test]
    fn blank_document_is_empty_pdf() {
        let err = lease_text(&["".to_string(), " \n".to_string()]).unwrap_err();
        assert_eq!(err.error_code(), "EMPTY_PDF");
        let info = lease_text(&["Tenant: Jane Doe".to_string()]).unwrap();
        assert_eq!(info.full_text, "Tenant: Jane Doe");
    }

    #[test]
    fn password_errors_are_recognised() {
        let e = classify_load_error("PdfiumLibraryInternalError(PasswordError)");
        assert_eq!(e.to_string(), "PDF is password-protected");
    }

    #[test]
    fn format_errors_are_corrupt() {
        let e = classify_load_error("PdfiumLibraryInternalError(FormatError)");
        assert_eq!(e.to_string(), "PDF file is corrupted");
        assert_eq!(e.error_code(), "PDF_EXTRACTION_FAILED");
    }

    #[test]
    fn unknown_errors_keep_detail() {
        let e = classify_load_error("Unknown");
        assert_eq!(e.details().unwrap(), "Error: Unknown");
    }
}

//! Request validation for free-text form fields and uploaded PDFs.

use crate::error::LeaseAiError;

/// Trim `text` and check its length (in characters) against `min..=max`.
pub fn validate_text_input(
    text: &str,
    field: &str,
    min: usize,
    max: usize,
) -> Result<String, LeaseAiError> {
    let cleaned = text.trim();
    let len = cleaned.chars().count();

    if len == 0 {
        return Err(LeaseAiError::Validation {
            message: format!("{} cannot be empty", capitalize(field)),
            details: Some(format!(
                "The {field} field contains only whitespace or is empty"
            )),
            suggestion: Some(format!("Please provide a valid {field}")),
        });
    }
    if len < min {
        return Err(LeaseAiError::Validation {
            message: format!("{} is too short", capitalize(field)),
            details: Some(format!(
                "The {field} must be at least {min} characters (currently {len})"
            )),
            suggestion: Some(format!("Please provide more details in your {field}")),
        });
    }
    if len > max {
        return Err(LeaseAiError::Validation {
            message: format!("{} is too long", capitalize(field)),
            details: Some(format!(
                "The {field} must be at most {max} characters (currently {len})"
            )),
            suggestion: Some(format!(
                "Please shorten your {field} to {max} characters or less"
            )),
        });
    }
    Ok(cleaned.to_string())
}

pub fn validate_maintenance_request(text: &str) -> Result<String, LeaseAiError> {
    validate_text_input(text, "maintenance request", 5, 2000)
}

pub fn validate_move_out_request(text: &str) -> Result<String, LeaseAiError> {
    validate_text_input(text, "move-out request", 5, 2000)
}

pub fn validate_tenant_message(text: &str) -> Result<String, LeaseAiError> {
    validate_text_input(text, "tenant message", 3, 1000)
}

/// Optional notes: absent or blank yields `None`.
pub fn validate_landlord_notes(notes: Option<&str>) -> Result<Option<String>, LeaseAiError> {
    validate_optional_notes(notes, "landlord notes")
}

pub fn validate_owner_notes(notes: Option<&str>) -> Result<Option<String>, LeaseAiError> {
    validate_optional_notes(notes, "owner notes")
}

fn validate_optional_notes(
    notes: Option<&str>,
    field: &str,
) -> Result<Option<String>, LeaseAiError> {
    match notes {
        Some(n) if !n.trim().is_empty() => validate_text_input(n, field, 3, 2000).map(Some),
        _ => Ok(None),
    }
}

/// Check an upload's name, size and `%PDF` magic bytes.
pub fn validate_pdf_upload(
    filename: &str,
    bytes: &[u8],
    max_bytes: usize,
) -> Result<(), LeaseAiError> {
    if !filename.to_lowercase().ends_with(".pdf") {
        return Err(LeaseAiError::UnsupportedFileType {
            filename: filename.to_string(),
        });
    }
    validate_pdf_bytes(bytes, max_bytes).map_err(|e| match e {
        // A renamed non-PDF is a type problem, not a content problem.
        LeaseAiError::Validation { ref message, .. } if message == "Invalid PDF file" => {
            LeaseAiError::UnsupportedFileType {
                filename: filename.to_string(),
            }
        }
        other => other,
    })
}

/// Content checks shared by uploads and internal callers.
pub fn validate_pdf_bytes(bytes: &[u8], max_bytes: usize) -> Result<(), LeaseAiError> {
    if bytes.is_empty() {
        return Err(LeaseAiError::Validation {
            message: "PDF file is empty".into(),
            details: Some("The uploaded file contains no data".into()),
            suggestion: Some("Please upload a valid PDF file".into()),
        });
    }
    if bytes.len() > max_bytes {
        return Err(LeaseAiError::FileTooLarge {
            size_mb: bytes.len() as f64 / (1024.0 * 1024.0),
            max_mb: (max_bytes / (1024 * 1024)) as u64,
        });
    }
    if !bytes.starts_with(b"%PDF") {
        return Err(LeaseAiError::Validation {
            message: "Invalid PDF file".into(),
            details: Some("The uploaded file does not appear to be a valid PDF".into()),
            suggestion: Some(
                "Please ensure you're uploading a PDF file, not another file type renamed to .pdf"
                    .into(),
            ),
        });
    }
    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

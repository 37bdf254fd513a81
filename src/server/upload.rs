//! Multipart form parsing shared by the upload endpoints.

use crate::error::LeaseAiError;
use crate::validators::validate_pdf_upload;
use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::Multipart;
use axum::http::StatusCode;
use std::collections::HashMap;

/// The form field carrying the lease.
const FILE_FIELD: &str = "file";

pub struct UploadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// A multipart body, or why axum refused it. Rejections are reported in
/// the usual error envelope by [`parse_form`].
pub type Upload = Result<Multipart, MultipartRejection>;

/// Every field of one multipart request.
#[derive(Default)]
pub struct LeaseForm {
    pub file: Option<UploadedFile>,
    pub fields: HashMap<String, String>,
}

fn read_error(e: MultipartError, max_bytes: usize) -> LeaseAiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        let max_mb = (max_bytes / (1024 * 1024)) as u64;
        return LeaseAiError::FileTooLarge {
            size_mb: (max_mb + 1) as f64,
            max_mb,
        };
    }
    LeaseAiError::bad_request(format!("Failed to read form field: {}", e.body_text()))
}

/// Read the whole form, field by field. Text fields are kept as sent.
pub async fn parse_form(upload: Upload, max_bytes: usize) -> Result<LeaseForm, LeaseAiError> {
    let mut multipart = upload?;
    let mut form = LeaseForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| read_error(e, max_bytes))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == FILE_FIELD {
            let filename = field.file_name().unwrap_or("upload.pdf").to_string();
            let data = field.bytes().await.map_err(|e| read_error(e, max_bytes))?.to_vec();
            form.file = Some(UploadedFile { filename, data });
        } else {
            let value = field.text().await.map_err(|e| read_error(e, max_bytes))?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}

impl LeaseForm {
    /// The uploaded lease after name, size and magic-byte checks.
    pub fn pdf(&mut self, max_bytes: usize) -> Result<UploadedFile, LeaseAiError> {
        let file = self
            .file
            .take()
            .ok_or_else(|| LeaseAiError::bad_request("No file uploaded"))?;
        validate_pdf_upload(&file.filename, &file.data, max_bytes)?;
        Ok(file)
    }

    /// A text field; blank counts as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn required(&self, name: &str) -> Result<&str, LeaseAiError> {
        self.text(name).ok_or_else(|| LeaseAiError::Validation {
            message: format!("{name} is required"),
            details: None,
            suggestion: Some(format!("Include the '{name}' form field")),
        })
    }

    /// An optional whole-number field.
    pub fn number(&self, name: &str) -> Result<Option<usize>, LeaseAiError> {
        self.text(name)
            .map(|raw| {
                raw.trim().parse().map_err(|_| LeaseAiError::Validation {
                    message: format!("{name} must be a whole number"),
                    details: Some(format!("Received '{raw}'")),
                    suggestion: None,
                })
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(fields: &[(&str, &str)]) -> LeaseForm {
        LeaseForm {
            file: None,
            fields: fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn missing_file_is_bad_request() {
        let err = form(&[]).pdf(1024).err().unwrap();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn wrong_extension_is_unsupported() {
        let mut f = LeaseForm {
            file: Some(UploadedFile {
                filename: "lease.docx".into(),
                data: b"%PDF-1.7".to_vec(),
            }),
            ..Default::default()
        };
        let err = f.pdf(1024).err().unwrap();
        assert_eq!(err.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[test]
    fn blank_fields_are_absent() {
        let f = form(&[("landlord_notes", "   "), ("window_size", "5")]);
        assert_eq!(f.text("landlord_notes"), None);
        assert_eq!(f.number("window_size").unwrap(), Some(5));
        assert_eq!(f.number("window_overlap").unwrap(), None);
        assert!(f.required("model_name").is_err());
    }

    #[test]
    fn non_numeric_window_is_validation_error() {
        let err = form(&[("window_size", "seven")]).number("window_size").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}

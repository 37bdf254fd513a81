//! OCR fallback for scanned leases.
//!
//! When the text layer is nearly empty the pages are rendered, encoded and
//! transcribed by a vision model. Pages whose transcription fails keep the
//! text pdfium found.

use super::encode::encode_page;
use super::render::render_pages;
use super::window::avg_chars_per_page;
use crate::config::{ExtractorConfig, FREE_MODEL};
use crate::llm::{ModelClient, ModelRequest};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

const OCR_PROMPT: &str = "Transcribe all text on this scanned lease page exactly as written. \
Preserve headings, numbering, dollar amounts and dates. \
Return only the transcribed text with no commentary.";

/// Result of a possible OCR pass.
#[derive(Debug, Clone, Default)]
pub struct OcrOutcome {
    pub pages: Vec<String>,
    pub applied: bool,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Whether the text layer is too thin to extract from.
pub fn needs_ocr(pages: &[String], threshold_chars: usize) -> bool {
    !pages.is_empty() && avg_chars_per_page(pages) < threshold_chars as f64
}

/// Run OCR on every page when [`needs_ocr`] says so; otherwise return the
/// pages untouched.
pub async fn ocr_if_needed(
    client: &dyn ModelClient,
    bytes: Vec<u8>,
    pages: Vec<String>,
    config: &ExtractorConfig,
) -> OcrOutcome {
    if !needs_ocr(&pages, config.ocr_threshold_chars) {
        return OcrOutcome {
            pages,
            ..Default::default()
        };
    }
    warn!(
        "Very little text extracted ({:.0} chars/page, threshold: {}); running OCR",
        avg_chars_per_page(&pages),
        config.ocr_threshold_chars
    );

    let indices: Vec<usize> = (0..pages.len()).collect();
    let images = match render_pages(bytes, config.ocr_max_pixels, indices).await {
        Ok(images) => images,
        Err(e) => {
            warn!("OCR rendering failed, keeping text layer: {}", e);
            return OcrOutcome {
                pages,
                ..Default::default()
            };
        }
    };

    let results: Vec<(usize, Option<(String, usize, usize)>)> = stream::iter(images)
        .map(|(idx, image)| async move {
            let data = match encode_page(&image) {
                Ok(data) => data,
                Err(e) => {
                    warn!("Page {}: image encoding failed: {}", idx + 1, e);
                    return (idx, None);
                }
            };
            let request = ModelRequest::new(FREE_MODEL, OCR_PROMPT)
                .temperature(0.0)
                .images(vec![data]);
            match client.complete(&request).await {
                Ok(c) => (idx, Some((c.text, c.input_tokens, c.output_tokens))),
                Err(e) => {
                    warn!("Page {}: OCR failed: {}", idx + 1, e);
                    (idx, None)
                }
            }
        })
        .buffer_unordered(config.max_concurrent.max(1))
        .collect()
        .await;

    let outcome = apply_transcriptions(pages, results);
    info!(
        "OCR applied: {:.0} chars/page after transcription",
        avg_chars_per_page(&outcome.pages)
    );
    outcome
}

fn apply_transcriptions(
    mut pages: Vec<String>,
    results: Vec<(usize, Option<(String, usize, usize)>)>,
) -> OcrOutcome {
    let mut input_tokens = 0;
    let mut output_tokens = 0;
    for (idx, result) in results {
        let Some((text, input, output)) = result else {
            continue;
        };
        input_tokens += input;
        output_tokens += output;
        if let Some(page) = pages.get_mut(idx) {
            if !text.trim().is_empty() {
                *page = text.trim().to_string();
            }
        }
    }
    OcrOutcome {
        pages,
        applied: true,
        input_tokens,
        output_tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedClient;

    fn long_page() -> String {
        "The tenant shall pay rent on the first day of each month. ".repeat(4)
    }

    #[test]
    fn threshold_is_average_per_page() {
        assert!(needs_ocr(&["".into(), "short".into()], 100));
        assert!(!needs_ocr(&[long_page(), long_page()], 100));
        assert!(!needs_ocr(&[], 100));
    }

    #[tokio::test]
    async fn text_pdfs_skip_ocr() {
        let client = ScriptedClient::always("unused");
        let pages = vec![long_page()];
        let out = ocr_if_needed(client.as_ref(), Vec::new(), pages.clone(), &ExtractorConfig::default()).await;
        assert!(!out.applied);
        assert_eq!(out.pages, pages);
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn failed_pages_keep_original_text() {
        let pages = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let out = apply_transcriptions(
            pages,
            vec![
                (0, Some(("Page one text".into(), 10, 5))),
                (1, None),
                (2, Some(("   ".into(), 3, 1))),
            ],
        );
        assert!(out.applied);
        assert_eq!(out.pages, vec!["Page one text", "b", "c"]);
        assert_eq!((out.input_tokens, out.output_tokens), (13, 6));
    }
}

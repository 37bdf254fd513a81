//! PDF rasterisation for the OCR fallback: render selected pages of an
//! uploaded document to `DynamicImage` via pdfium.
//!
//! Scanned leases come in at every paper size, so the longest edge is capped
//! in pixels rather than set by DPI.

use super::text::{bind_pdfium, classify_load_error};
use crate::error::LeaseAiError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::{debug, warn};

/// Rasterise `page_indices` (0-based) of an in-memory PDF.
///
/// Pages that fail to render are skipped with a warning; the caller keeps
/// their extracted text instead.
pub async fn render_pages(
    bytes: Vec<u8>,
    max_pixels: u32,
    page_indices: Vec<usize>,
) -> Result<Vec<(usize, DynamicImage)>, LeaseAiError> {
    tokio::task::spawn_blocking(move || render_pages_blocking(&bytes, max_pixels, &page_indices))
        .await
        .map_err(|e| LeaseAiError::Internal(format!("Render task panicked: {e}")))?
}

fn render_pages_blocking(
    bytes: &[u8],
    max_pixels: u32,
    page_indices: &[usize],
) -> Result<Vec<(usize, DynamicImage)>, LeaseAiError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| classify_load_error(&format!("{e:?}")))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(page_indices.len());
    for &idx in page_indices {
        if idx >= total_pages {
            warn!("Skipping page {} (out of range, total={})", idx + 1, total_pages);
            continue;
        }
        let page = match pages.get(idx as u16) {
            Ok(page) => page,
            Err(e) => {
                warn!("Failed to load page {}: {:?}", idx + 1, e);
                continue;
            }
        };
        let bitmap = match page.render_with_config(&render_config) {
            Ok(bitmap) => bitmap,
            Err(e) => {
                warn!("Failed to render page {}: {:?}", idx + 1, e);
                continue;
            }
        };
        let image = bitmap.as_image();
        debug!("Rendered page {} → {}x{} px", idx + 1, image.width(), image.height());
        results.push((idx, image));
    }
    Ok(results)
}

//! PDF stages shared by every endpoint.
//!
//! ```text
//! text ──▶ (ocr: render ──▶ encode ──▶ vision model) ──▶ window ──▶ model ──▶ postprocess
//! ```
//!
//! 1. [`text`] pulls the text layer with pdfium inside `spawn_blocking`
//! 2. [`ocr`] replaces a near-empty text layer with vision transcriptions,
//!    using [`render`] and [`encode`]
//! 3. [`window`] slices pages into overlapping windows for lease extraction
//! 4. [`postprocess`] recovers JSON from model output

pub mod encode;
pub mod ocr;
pub mod postprocess;
pub mod render;
pub mod text;
pub mod window;

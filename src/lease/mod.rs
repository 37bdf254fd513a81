//! Structured lease extraction.
//!
//! [`LeaseExtractor`] runs the sliding-window pipeline; [`schema`] holds the
//! typed output, [`merger`] folds window answers together and [`report`]
//! builds the response metadata and summary.

pub mod extractor;
pub mod merger;
pub mod prompts;
pub mod report;
pub mod schema;

pub use extractor::{LeaseExtractor, WindowResult};
pub use report::{ExtractionMetadata, LeaseExtractionResponse};
pub use schema::LeaseData;

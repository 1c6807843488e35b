//! ReportLens ingestion library
//!
//! Validates PDFs, extracts per-page text, and builds index generations:
//! the uploaded namespace is replaced wholesale per upload, the reports
//! namespace is rebuilt once at startup from the fixed corpus directory.

pub mod errors;
pub mod indexer;
pub mod pdf;

pub use errors::IngestionError;
pub use indexer::{CorpusOutcome, DocumentIndexer, UploadOutcome};

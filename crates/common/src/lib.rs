//! ReportLens Common Library
//!
//! Shared code for the ReportLens services including:
//! - Error types and handling
//! - Configuration management
//! - LLM chat client and retry policy
//! - Document index abstraction and generation store
//! - OCR client abstraction
//! - Query pipeline (compression, synthesis, annotation)
//! - Audit sink and metrics

pub mod audit;
pub mod config;
pub mod context;
pub mod errors;
pub mod index;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod ocr;

// Re-export commonly used types
pub use audit::AuditSink;
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use index::{DocumentIndex, IndexStore, PageHit};
pub use llm::{ChatApi, ChatMessage};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Namespace of the fixed reports corpus, rebuilt at startup
pub const REPORTS_NAMESPACE: &str = "reports";

/// Namespace replaced wholesale on each user upload
pub const UPLOADED_NAMESPACE: &str = "uploaded";

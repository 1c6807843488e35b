//! Ingestion error types

use reportlens_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Unsupported format: {content_type}")]
    UnsupportedFormat { content_type: String },

    #[error("Empty document: {filename}")]
    EmptyDocument { filename: String },

    #[error("PDF parse error for {path}: {message}")]
    PdfParse { path: String, message: String },

    #[error("Index service error: {0}")]
    IndexService(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<AppError> for IngestionError {
    fn from(e: AppError) -> Self {
        IngestionError::IndexService(e.to_string())
    }
}

impl From<IngestionError> for AppError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::UnsupportedFormat { content_type } => {
                AppError::UnsupportedFormat { content_type }
            }
            IngestionError::EmptyDocument { filename } => AppError::EmptyDocument { filename },
            IngestionError::PdfParse { path, message } => AppError::Validation {
                message: format!("Could not parse {}: {}", path, message),
            },
            IngestionError::IndexService(message) => AppError::IndexService { message },
            IngestionError::Io(e) => AppError::Internal {
                message: e.to_string(),
            },
        }
    }
}

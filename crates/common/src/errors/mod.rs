//! Error types for ReportLens services
//!
//! Provides:
//! - Distinct error types for the pipeline failure modes
//! - Transient/fatal classification for the retry policy
//! - HTTP status code mapping
//! - Structured error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// HTTP statuses the retry policy treats as transient
const TRANSIENT_STATUSES: [u16; 4] = [429, 502, 503, 504];

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    UnsupportedFormat,
    EmptyDocument,
    NoMessages,

    // Index state errors (2xxx)
    EmptyIndex,

    // External service errors (8xxx)
    LlmError,
    LlmTimeout,
    IndexServiceError,
    OcrError,
    UpstreamError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::UnsupportedFormat => 1002,
            ErrorCode::EmptyDocument => 1003,
            ErrorCode::NoMessages => 1004,

            // Index state (2xxx)
            ErrorCode::EmptyIndex => 2001,

            // External (8xxx)
            ErrorCode::LlmError => 8001,
            ErrorCode::LlmTimeout => 8002,
            ErrorCode::IndexServiceError => 8003,
            ErrorCode::OcrError => 8004,
            ErrorCode::UpstreamError => 8005,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Unsupported format: {content_type} (only PDF files are allowed)")]
    UnsupportedFormat { content_type: String },

    #[error("Empty document: {filename} has no extractable page content")]
    EmptyDocument { filename: String },

    #[error("No messages provided")]
    NoMessages,

    // Index state errors
    #[error("Index namespace '{namespace}' has no indexed content")]
    EmptyIndex { namespace: String },

    // External service errors
    #[error("LLM service error {status}: {message}")]
    LlmStatus { status: u16, message: String },

    #[error("LLM request timed out after {timeout_ms}ms")]
    LlmTimeout { timeout_ms: u64 },

    #[error("Index service error: {message}")]
    IndexService { message: String },

    #[error("OCR service error: {message}")]
    OcrService { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::UnsupportedFormat { .. } => ErrorCode::UnsupportedFormat,
            AppError::EmptyDocument { .. } => ErrorCode::EmptyDocument,
            AppError::NoMessages => ErrorCode::NoMessages,
            AppError::EmptyIndex { .. } => ErrorCode::EmptyIndex,
            AppError::LlmStatus { .. } => ErrorCode::LlmError,
            AppError::LlmTimeout { .. } => ErrorCode::LlmTimeout,
            AppError::IndexService { .. } => ErrorCode::IndexServiceError,
            AppError::OcrService { .. } => ErrorCode::OcrError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } | AppError::NoMessages => StatusCode::BAD_REQUEST,

            // 415 Unsupported Media Type
            AppError::UnsupportedFormat { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,

            // 422 Unprocessable Entity
            AppError::EmptyDocument { .. } | AppError::EmptyIndex { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }

            // 500 Internal Server Error
            AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::LlmStatus { .. }
            | AppError::IndexService { .. }
            | AppError::OcrService { .. }
            | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 504 Gateway Timeout
            AppError::LlmTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Whether the retry policy should retry this error.
    ///
    /// Transient: an upstream timeout, or an upstream HTTP 429/502/503/504.
    /// Everything else is fatal and propagates immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::LlmTimeout { .. } => true,
            AppError::LlmStatus { status, .. } => TRANSIENT_STATUSES.contains(status),
            AppError::HttpClient(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::UnsupportedFormat {
            content_type: "text/plain".into(),
        };
        assert_eq!(err.code(), ErrorCode::UnsupportedFormat);
        assert_eq!(err.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::NoMessages;
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_classification() {
        for status in [429u16, 502, 503, 504] {
            let err = AppError::LlmStatus {
                status,
                message: "busy".into(),
            };
            assert!(err.is_transient(), "status {} should be transient", status);
        }

        let fatal = AppError::LlmStatus {
            status: 401,
            message: "bad key".into(),
        };
        assert!(!fatal.is_transient());

        let timeout = AppError::LlmTimeout { timeout_ms: 30_000 };
        assert!(timeout.is_transient());
    }

    #[test]
    fn test_empty_index_is_validation_style() {
        let err = AppError::EmptyIndex {
            namespace: "uploaded".into(),
        };
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(!err.is_transient());
    }
}

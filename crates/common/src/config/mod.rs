//! Configuration management for ReportLens services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{env}.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Corpus and upload directories
    pub corpus: CorpusConfig,

    /// Retrieval configuration (external page-index service)
    pub retrieval: RetrievalConfig,

    /// LLM chat completion configuration
    pub llm: LlmConfig,

    /// OCR service configuration
    pub ocr: OcrConfig,

    /// Audit log configuration
    pub audit: AuditConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds (the only deadline around the pipeline;
    /// the retry loop itself is unbounded)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorpusConfig {
    /// Directory of the fixed reports corpus, indexed at startup
    #[serde(default = "default_reports_dir")]
    pub reports_dir: String,

    /// Directory where uploaded PDFs are stored
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Base URL of the external page-index service
    #[serde(default = "default_index_url")]
    pub service_url: String,

    /// Number of pages to retrieve per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// API base URL (OpenAI-compatible)
    #[serde(default = "default_llm_base")]
    pub api_base: String,

    /// API key
    pub api_key: Option<String>,

    /// Chat model
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Temperature for pipeline calls (low for factual consistency)
    #[serde(default = "default_pipeline_temperature")]
    pub pipeline_temperature: f32,

    /// Temperature for the interactive chat endpoint
    #[serde(default = "default_chat_temperature")]
    pub chat_temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,

    /// Fixed backoff between retries in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Maximum retry attempts; absent means retry indefinitely
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OcrConfig {
    /// Base URL of the text-recognition service
    #[serde(default = "default_ocr_url")]
    pub service_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,

    /// How many top evidence images receive highlights
    #[serde(default = "default_highlight_pages")]
    pub max_highlight_pages: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditConfig {
    /// Path of the append-only audit log file
    #[serde(default = "default_audit_path")]
    pub path: String,

    /// Bounded queue capacity; overflow drops the new event
    #[serde(default = "default_audit_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_request_timeout() -> u64 { 120 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_reports_dir() -> String { "data/raw".to_string() }
fn default_upload_dir() -> String { "data/uploaded".to_string() }
fn default_index_url() -> String { "http://localhost:8100".to_string() }
fn default_top_k() -> usize { 3 }
fn default_upstream_timeout() -> u64 { 30 }
fn default_llm_base() -> String { "https://api.openai.com/v1".to_string() }
fn default_llm_model() -> String { "gpt-4o-mini".to_string() }
fn default_pipeline_temperature() -> f32 { 0.2 }
fn default_chat_temperature() -> f32 { 0.7 }
fn default_retry_backoff_ms() -> u64 { 500 }
fn default_ocr_url() -> String { "http://localhost:8200".to_string() }
fn default_highlight_pages() -> usize { 2 }
fn default_audit_path() -> String { "data/audit.log".to_string() }
fn default_audit_capacity() -> usize { 1024 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "reportlens".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8001
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get the fixed retry backoff as Duration
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.llm.retry_backoff_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                shutdown_timeout_secs: default_shutdown_timeout(),
            },
            corpus: CorpusConfig {
                reports_dir: default_reports_dir(),
                upload_dir: default_upload_dir(),
            },
            retrieval: RetrievalConfig {
                service_url: default_index_url(),
                top_k: default_top_k(),
                timeout_secs: default_upstream_timeout(),
            },
            llm: LlmConfig {
                api_base: default_llm_base(),
                api_key: None,
                model: default_llm_model(),
                pipeline_temperature: default_pipeline_temperature(),
                chat_temperature: default_chat_temperature(),
                timeout_secs: default_upstream_timeout(),
                retry_backoff_ms: default_retry_backoff_ms(),
                max_attempts: None,
            },
            ocr: OcrConfig {
                service_url: default_ocr_url(),
                timeout_secs: default_upstream_timeout(),
                max_highlight_pages: default_highlight_pages(),
            },
            audit: AuditConfig {
                path: default_audit_path(),
                queue_capacity: default_audit_capacity(),
            },
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: default_json_logging(),
                metrics_port: default_metrics_port(),
                service_name: default_service_name(),
            },
        }
    }
}

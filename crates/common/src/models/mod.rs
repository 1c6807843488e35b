//! Shared request/response models for the ReportLens pipeline

use serde::{Deserialize, Serialize};

/// One conversation turn; the caller owns history across requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Turn role: "user", "assistant" or "system"
    pub role: String,

    /// Turn text content
    pub content: String,
}

/// Citation pointing at the top retrieved page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCitation {
    pub doc_id: String,
    pub page: u32,
}

/// Query request body: the full conversation so far
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub messages: Vec<ChatTurn>,
}

/// Query response returned to the HTTP layer
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    /// User-facing answer with the keyword section stripped
    pub answer: String,

    /// (doc_id, page) of the top retrieved page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation: Option<PageCitation>,

    /// Base64 PNG pages with evidence highlights
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlighted_images: Option<Vec<String>>,
}

/// Upload response returned to the HTTP layer
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks_added: Option<usize>,
}

/// Chat request body for the interactive streaming endpoint
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatTurn>,
}

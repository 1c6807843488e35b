//! Interactive streaming chat handler
//!
//! Free-form conversation without retrieval; tokens are streamed to the
//! client as they arrive from the upstream model.

use crate::AppState;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::header,
    response::Response,
};
use futures::StreamExt;
use reportlens_common::{
    errors::{AppError, Result},
    llm::{ChatMessage, MessageContent},
    models::ChatRequest,
};

/// Stream a chat completion over the raw conversation
pub async fn chat(
    State(state): State<AppState>,
    axum::Json(request): axum::Json<ChatRequest>,
) -> Result<Response> {
    if request.messages.is_empty() {
        return Err(AppError::NoMessages);
    }

    let messages: Vec<ChatMessage> = request
        .messages
        .iter()
        .map(|turn| ChatMessage {
            role: turn.role.clone(),
            content: MessageContent::Text(turn.content.clone()),
        })
        .collect();

    let tokens = state
        .chat
        .complete_stream(&messages, state.config.llm.chat_temperature)
        .await?;

    let body = Body::from_stream(tokens.map(|token| token.map(Bytes::from)));

    Response::builder()
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(body)
        .map_err(|e| AppError::Internal {
            message: format!("Failed to build streaming response: {}", e),
        })
}

//! PDF upload handler

use crate::AppState;
use axum::{
    extract::{Multipart, State},
    Json,
};
use reportlens_common::{
    errors::{AppError, Result},
    metrics,
    models::UploadResponse,
};
use std::time::Instant;
use tracing::info;

/// Accept one PDF and index it into the uploaded namespace, replacing any
/// previously uploaded document
pub async fn upload_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let start = Instant::now();

    let mut upload: Option<(String, String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::Validation {
        message: format!("Invalid multipart body: {}", e),
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .unwrap_or("upload.pdf")
            .to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(|e| AppError::Validation {
            message: format!("Failed to read upload: {}", e),
        })?;
        upload = Some((filename, content_type, bytes.to_vec()));
        break;
    }

    let Some((filename, content_type, bytes)) = upload else {
        return Err(AppError::Validation {
            message: "Missing file field".to_string(),
        });
    };

    let outcome = state
        .indexer
        .index_upload(&filename, &content_type, &bytes)
        .await
        .map_err(AppError::from)?;

    metrics::record_upload(outcome.chunks_added);
    info!(
        doc_id = %outcome.document.doc_id,
        chunks = outcome.chunks_added,
        latency_ms = start.elapsed().as_millis() as u64,
        "Upload indexed"
    );

    Ok(Json(UploadResponse {
        message: format!("Indexed {}", outcome.document.filename),
        chunks_added: Some(outcome.chunks_added),
    }))
}

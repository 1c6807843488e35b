//! Query handlers
//!
//! Both endpoints run the same pipeline; they differ only in which
//! namespace they search.

use crate::AppState;
use axum::{extract::State, Json};
use reportlens_common::{
    errors::Result,
    models::{QueryRequest, QueryResponse},
    REPORTS_NAMESPACE, UPLOADED_NAMESPACE,
};

/// Answer a question against the fixed reports corpus
pub async fn report_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    run_query(&state, REPORTS_NAMESPACE, request).await
}

/// Answer a question against the most recently uploaded document
pub async fn custom_pdf_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    run_query(&state, UPLOADED_NAMESPACE, request).await
}

async fn run_query(
    state: &AppState,
    namespace: &str,
    request: QueryRequest,
) -> Result<Json<QueryResponse>> {
    let response = state.pipeline.answer(namespace, &request.messages).await?;
    Ok(Json(response))
}

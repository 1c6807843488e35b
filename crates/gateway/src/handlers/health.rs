//! Health check handlers

use crate::AppState;
use axum::{extract::State, Json};
use reportlens_common::REPORTS_NAMESPACE;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub reports_index: CheckResult,
    pub audit_log: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Readiness probe - checks the reports index and the audit writer
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let reports_check = if state.store.has_content(REPORTS_NAMESPACE) {
        CheckResult {
            status: "up".to_string(),
            detail: None,
        }
    } else {
        CheckResult {
            status: "down".to_string(),
            detail: Some("reports namespace has no indexed content".to_string()),
        }
    };

    let audit_check = if state.audit.is_alive() {
        CheckResult {
            status: "up".to_string(),
            detail: None,
        }
    } else {
        CheckResult {
            status: "down".to_string(),
            detail: Some("audit writer task has stopped".to_string()),
        }
    };

    let all_healthy = reports_check.status == "up" && audit_check.status == "up";

    Json(ReadyResponse {
        status: if all_healthy { "ready" } else { "not_ready" }.to_string(),
        checks: HealthChecks {
            reports_index: reports_check,
            audit_log: audit_check,
        },
    })
}

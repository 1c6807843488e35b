//! HTTP adapter for the external page-index service
//!
//! The service owns embedding computation and nearest-neighbor search over
//! rendered report pages; this client only speaks its contract:
//! `POST /index {path, namespace, overwrite}` and
//! `POST /search {namespace, query, k}`.

use super::{rank_hits, DocumentIndex, PageHit};
use crate::config::RetrievalConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub struct PageIndexClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct IndexRequest<'a> {
    path: &'a str,
    namespace: &'a str,
    /// Prior content of the namespace is always discarded
    overwrite: bool,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    namespace: &'a str,
    query: &'a str,
    k: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<WireHit>,
}

#[derive(Deserialize)]
struct WireHit {
    doc_id: String,
    page: u32,
    score: f32,
    #[serde(default)]
    base64: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

impl PageIndexClient {
    pub fn new(config: &RetrievalConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.service_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<Req: Serialize, Resp: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        request: &Req,
    ) -> Result<Resp> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, endpoint))
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::IndexService {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::IndexService {
                message: format!("API error {}: {}", status, body),
            });
        }

        response.json().await.map_err(|e| AppError::IndexService {
            message: format!("Failed to parse response: {}", e),
        })
    }
}

#[async_trait]
impl DocumentIndex for PageIndexClient {
    async fn index(&self, source: &Path, namespace: &str) -> Result<()> {
        debug!(source = %source.display(), namespace, "Delegating index build");

        let path = source.display().to_string();
        let request = IndexRequest {
            path: &path,
            namespace,
            overwrite: true,
        };
        let _: serde_json::Value = self.post("index", &request).await?;
        Ok(())
    }

    async fn search(&self, namespace: &str, query: &str, k: usize) -> Result<Vec<PageHit>> {
        let request = SearchRequest {
            namespace,
            query,
            k,
        };
        let response: SearchResponse = self.post("search", &request).await?;

        let hits = response
            .results
            .into_iter()
            .map(|h| PageHit {
                doc_id: h.doc_id,
                page: h.page,
                score: h.score,
                image_base64: h.base64,
                text: h.text,
            })
            .collect();

        // The ordering contract is ours, not the backend's
        Ok(rank_hits(hits))
    }
}

//! Text-recognition (OCR) client abstraction
//!
//! The OCR engine is an external service; this module defines the
//! capability the annotator consumes — word-level bounding boxes for an
//! image — and an HTTP adapter for a tesseract-style sidecar.

use crate::config::OcrConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pixel-space box of one recognized word
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// One recognized word with its box
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizedWord {
    pub text: String,
    #[serde(flatten)]
    pub bbox: BoundingBox,
}

/// Word-level text recognition capability
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Recognize words and their bounding boxes in a PNG image
    async fn recognize(&self, png: &[u8]) -> Result<Vec<RecognizedWord>>;
}

/// HTTP adapter for a tesseract-style OCR service
///
/// Contract: `POST /recognize {image_base64}` returning `{words: [...]}`.
pub struct OcrClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct RecognizeRequest {
    image_base64: String,
}

#[derive(Deserialize)]
struct RecognizeResponse {
    words: Vec<RecognizedWord>,
}

impl OcrClient {
    pub fn new(config: &OcrConfig) -> Result<Self> {
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
}

#[async_trait]
impl TextRecognizer for OcrClient {
    async fn recognize(&self, png: &[u8]) -> Result<Vec<RecognizedWord>> {
        let request = RecognizeRequest {
            image_base64: base64::engine::general_purpose::STANDARD.encode(png),
        };

        let response = self
            .client
            .post(format!("{}/recognize", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::OcrService {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::OcrService {
                message: format!("API error {}: {}", status, body),
            });
        }

        let parsed: RecognizeResponse =
            response.json().await.map_err(|e| AppError::OcrService {
                message: format!("Failed to parse response: {}", e),
            })?;

        Ok(parsed.words)
    }
}

/// Recognizer answering with a fixed word list, for tests
pub struct FixedRecognizer {
    words: Vec<RecognizedWord>,
}

impl FixedRecognizer {
    pub fn new(words: Vec<RecognizedWord>) -> Self {
        Self { words }
    }
}

#[async_trait]
impl TextRecognizer for FixedRecognizer {
    async fn recognize(&self, _png: &[u8]) -> Result<Vec<RecognizedWord>> {
        Ok(self.words.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognized_word_flattens_bbox() {
        let json = r#"{"text": "Revenue", "left": 10, "top": 20, "width": 80, "height": 16}"#;
        let word: RecognizedWord = serde_json::from_str(json).unwrap();
        assert_eq!(word.text, "Revenue");
        assert_eq!(word.bbox.left, 10);
        assert_eq!(word.bbox.height, 16);
    }
}

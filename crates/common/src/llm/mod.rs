//! LLM chat completion client
//!
//! Thin client over an OpenAI-compatible chat completions API supporting
//! plain text and mixed text/image content parts, plus a token-streaming
//! mode for the interactive chat endpoint. Transient upstream failures are
//! classified here and handled by [`retry::RetryPolicy`].

mod retry;

pub use retry::RetryPolicy;

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;

/// One part of a mixed-content user message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// Image part carrying a base64 PNG as a data URL
    pub fn png_base64(b64: impl AsRef<str>) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: format!("data:image/png;base64,{}", b64.as_ref()),
            },
        }
    }
}

/// Message content: plain text or content parts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One chat message on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(parts),
        }
    }
}

/// Chat completion capability consumed by the pipeline
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Complete a conversation, returning the assistant text
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String>;
}

/// Token stream produced by [`OpenAiChatClient::complete_stream`]
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Client for an OpenAI-compatible chat completions endpoint
pub struct OpenAiChatClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    timeout_ms: u64,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    content: String,
}

impl OpenAiChatClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().unwrap_or_default(),
            model: config.model.clone(),
            timeout_ms: config.timeout_secs * 1000,
        })
    }

    async fn send(&self, messages: &[ChatMessage], temperature: f32, stream: bool) -> Result<reqwest::Response> {
        let request = WireRequest {
            model: &self.model,
            messages,
            temperature,
            stream,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::LlmTimeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    AppError::HttpClient(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::LlmStatus {
                status,
                message: body,
            });
        }

        Ok(response)
    }

    /// Stream assistant tokens as they arrive (SSE content deltas)
    pub async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<TokenStream> {
        let response = self.send(messages, temperature, true).await?;
        let bytes = response.bytes_stream().boxed();

        let stream = futures::stream::unfold(
            (bytes, String::new(), false),
            |(mut inner, mut buf, done)| async move {
                if done {
                    return None;
                }
                loop {
                    // Emit complete SSE lines already buffered
                    if let Some(pos) = buf.find('\n') {
                        let line: String = buf.drain(..=pos).collect();
                        let line = line.trim();
                        if let Some(data) = line.strip_prefix("data: ") {
                            if data == "[DONE]" {
                                return None;
                            }
                            if let Ok(value) = serde_json::from_str::<serde_json::Value>(data) {
                                if let Some(delta) =
                                    value["choices"][0]["delta"]["content"].as_str()
                                {
                                    if !delta.is_empty() {
                                        return Some((
                                            Ok(delta.to_string()),
                                            (inner, buf, false),
                                        ));
                                    }
                                }
                            }
                        }
                        continue;
                    }

                    match inner.next().await {
                        Some(Ok(chunk)) => buf.push_str(&String::from_utf8_lossy(&chunk)),
                        Some(Err(e)) => {
                            return Some((Err(AppError::HttpClient(e)), (inner, buf, true)))
                        }
                        None => return None,
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl ChatApi for OpenAiChatClient {
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        let response = self.send(messages, temperature, false).await?;

        let parsed: WireResponse = response.json().await.map_err(|e| AppError::LlmStatus {
            status: 0,
            message: format!("Failed to parse completion response: {}", e),
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::LlmStatus {
                status: 0,
                message: "Empty response from LLM".to_string(),
            })
    }
}

/// Scripted chat API for tests: pops one scripted outcome per call
pub struct ScriptedChatApi {
    script: std::sync::Mutex<std::collections::VecDeque<Result<String>>>,
    calls: std::sync::atomic::AtomicUsize,
}

impl ScriptedChatApi {
    pub fn new(script: Vec<Result<String>>) -> Self {
        Self {
            script: std::sync::Mutex::new(script.into_iter().collect()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Always answers with the same text
    pub fn always(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(vec![Ok(text)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatApi for ScriptedChatApi {
    async fn complete(&self, _messages: &[ChatMessage], _temperature: f32) -> Result<String> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        match script.pop_front() {
            Some(outcome) => {
                // A single-entry script keeps answering the same text
                if script.is_empty() {
                    if let Ok(text) = &outcome {
                        script.push_back(Ok(text.clone()));
                    }
                }
                outcome
            }
            None => Err(AppError::Internal {
                message: "scripted chat api exhausted".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_content_serialization() {
        let plain = ChatMessage::user("hello");
        let json = serde_json::to_value(&plain).unwrap();
        assert_eq!(json["content"], "hello");

        let mixed = ChatMessage::user_parts(vec![
            ContentPart::text("What was Q3 revenue?"),
            ContentPart::png_base64("aGVsbG8="),
        ]);
        let json = serde_json::to_value(&mixed).unwrap();
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][1]["type"], "image_url");
        assert!(json["content"][1]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_scripted_api_pops_in_order() {
        let api = ScriptedChatApi::new(vec![
            Err(AppError::LlmStatus {
                status: 503,
                message: "busy".into(),
            }),
            Ok("done".to_string()),
        ]);

        assert!(api.complete(&[], 0.2).await.is_err());
        assert_eq!(api.complete(&[], 0.2).await.unwrap(), "done");
        assert_eq!(api.calls(), 2);
    }
}

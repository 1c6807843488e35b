//! Answer synthesizer
//!
//! Assembles the grounded-answer prompt from the retrieved evidence and
//! invokes the LLM at low temperature under the retry policy.

use crate::audit::AuditSink;
use crate::errors::Result;
use crate::index::PageHit;
use crate::llm::{ChatApi, ChatMessage, ContentPart, RetryPolicy};
use std::sync::Arc;
use tracing::debug;

/// Content-level contract: the model must prefer an honest refusal over
/// fabrication, and must emit the keyword line the annotator consumes.
const SYSTEM_PROMPT: &str = "You are an assistant that answers questions strictly from the \
report pages provided as context. Answer the user's question as accurately as possible \
using only that evidence. If the evidence does not contain the answer, reply exactly: \
\"I couldn't find the relevant information in the report.\" When you do answer, end with \
a final line formatted as **Keywords:** 'value', 'value' listing the exact figures and \
terms from the evidence that support the answer.";

/// One retrieved page as presented to the model
#[derive(Debug, Clone)]
pub enum Evidence {
    /// Rendered page image, base64 PNG
    Image(String),
    /// Extracted page text
    Text(String),
}

impl Evidence {
    /// Evidence representation of a retrieval hit, preferring the image
    pub fn from_hit(hit: &PageHit) -> Option<Self> {
        if let Some(image) = &hit.image_base64 {
            Some(Evidence::Image(image.clone()))
        } else {
            hit.text.clone().map(Evidence::Text)
        }
    }
}

pub struct AnswerSynthesizer {
    chat: Arc<dyn ChatApi>,
    retry: RetryPolicy,
    temperature: f32,
}

impl AnswerSynthesizer {
    pub fn new(chat: Arc<dyn ChatApi>, retry: RetryPolicy, temperature: f32) -> Self {
        Self {
            chat,
            retry,
            temperature,
        }
    }

    /// Produce the raw answer for `query` over `evidence`, in retrieval order
    pub async fn synthesize(
        &self,
        audit: &dyn AuditSink,
        query: &str,
        evidence: &[Evidence],
    ) -> Result<String> {
        let mut parts = vec![ContentPart::text(query)];
        for item in evidence {
            match item {
                Evidence::Image(b64) => parts.push(ContentPart::png_base64(b64)),
                Evidence::Text(text) => parts.push(ContentPart::text(text.clone())),
            }
        }

        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user_parts(parts),
        ];

        debug!(evidence_items = evidence.len(), "Synthesizing answer");

        self.retry
            .run("synthesize", audit, || {
                self.chat.complete(&messages, self.temperature)
            })
            .await
    }
}

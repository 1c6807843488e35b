//! Context compressor
//!
//! Reduces multi-turn conversation history to the minimal context relevant
//! to the current turn. Single-turn conversations skip the LLM entirely.

use crate::audit::AuditSink;
use crate::errors::Result;
use crate::llm::{ChatApi, ChatMessage, RetryPolicy};
use crate::models::ChatTurn;
use std::sync::Arc;
use tracing::debug;

/// Filler outputs the prompt forbids; any response line containing one is
/// dropped before the query is assembled
const FILLER_PHRASES: &[&str] = &[
    "no relevant context",
    "there is no relevant",
    "no prior context",
    "nothing relevant",
];

const SYSTEM_PROMPT: &str = "You are a conversation context extractor for a document retrieval system.";

pub struct ContextCompressor {
    chat: Arc<dyn ChatApi>,
    retry: RetryPolicy,
    temperature: f32,
}

impl ContextCompressor {
    pub fn new(chat: Arc<dyn ChatApi>, retry: RetryPolicy, temperature: f32) -> Self {
        Self {
            chat,
            retry,
            temperature,
        }
    }

    /// Compress `history` into context relevant to `current` and combine
    /// them into the search query.
    ///
    /// With zero prior turns the current turn is returned unchanged and no
    /// LLM call is made.
    pub async fn compress(
        &self,
        audit: &dyn AuditSink,
        history: &[ChatTurn],
        current: &str,
    ) -> Result<String> {
        if history.is_empty() {
            return Ok(current.to_string());
        }

        let history_text = history
            .iter()
            .map(|turn| format!("{}: {}", turn.role, turn.content))
            .collect::<Vec<_>>()
            .join("\n");

        let instruction = format!(
            "Extract only the information from the conversation below that is \
             relevant to the user's latest question. The extract is prefixed to \
             the question before document retrieval, so keep it brief and \
             factual. If nothing in the conversation is relevant, output \
             nothing at all - never write phrases such as 'no relevant context'.\n\n\
             Latest question:\n{}\n\n\
             Conversation:\n{}",
            current, history_text
        );

        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(instruction),
        ];

        let response = self
            .retry
            .run("compress", audit, || {
                self.chat.complete(&messages, self.temperature)
            })
            .await?;

        let context = scrub_filler(&response);
        debug!(context_len = context.len(), "Compressed conversation context");

        if context.is_empty() {
            Ok(current.to_string())
        } else {
            Ok(format!("{}\n{}", context, current))
        }
    }
}

/// Drop any line carrying a forbidden filler phrase
fn scrub_filler(text: &str) -> String {
    text.lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            !FILLER_PHRASES.iter().any(|phrase| lower.contains(phrase))
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::llm::ScriptedChatApi;
    use std::time::Duration;

    fn turn(role: &str, content: &str) -> ChatTurn {
        ChatTurn {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    fn compressor(chat: Arc<ScriptedChatApi>) -> ContextCompressor {
        ContextCompressor::new(chat, RetryPolicy::unbounded(Duration::from_millis(1)), 0.2)
    }

    #[tokio::test]
    async fn test_single_turn_skips_llm() {
        let chat = Arc::new(ScriptedChatApi::always("should never be used"));
        let compressor = compressor(chat.clone());
        let audit = MemoryAuditSink::new();

        let query = compressor
            .compress(audit.as_ref(), &[], "What was Q3 revenue?")
            .await
            .unwrap();

        assert_eq!(query, "What was Q3 revenue?");
        assert_eq!(chat.calls(), 0);
    }

    #[tokio::test]
    async fn test_multi_turn_makes_exactly_one_call() {
        let chat = Arc::new(ScriptedChatApi::always(
            "The user is asking about Apple's 2023 annual report.",
        ));
        let compressor = compressor(chat.clone());
        let audit = MemoryAuditSink::new();

        let history = [
            turn("user", "Open the Apple 2023 annual report"),
            turn("assistant", "Loaded."),
        ];
        let query = compressor
            .compress(audit.as_ref(), &history, "What was Q3 revenue?")
            .await
            .unwrap();

        assert_eq!(chat.calls(), 1);
        assert_eq!(
            query,
            "The user is asking about Apple's 2023 annual report.\nWhat was Q3 revenue?"
        );
    }

    #[tokio::test]
    async fn test_filler_output_never_reaches_query() {
        let chat = Arc::new(ScriptedChatApi::always(
            "There is no relevant context in this conversation.",
        ));
        let compressor = compressor(chat.clone());
        let audit = MemoryAuditSink::new();

        let history = [turn("user", "hello"), turn("assistant", "hi")];
        let query = compressor
            .compress(audit.as_ref(), &history, "What was Q3 revenue?")
            .await
            .unwrap();

        assert_eq!(chat.calls(), 1);
        assert_eq!(query, "What was Q3 revenue?");
        for phrase in FILLER_PHRASES {
            assert!(!query.to_lowercase().contains(phrase));
        }
    }

    #[test]
    fn test_scrub_filler_keeps_real_context() {
        let text = "Apple reported record earnings.\nNo relevant context otherwise.";
        assert_eq!(scrub_filler(text), "Apple reported record earnings.");
    }
}

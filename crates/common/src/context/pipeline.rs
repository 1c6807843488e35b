//! Query pipeline orchestrator
//!
//! Strict per-request order: compress → retrieve → synthesize → annotate.
//! The pipeline is stateless between requests; only the index store and the
//! audit log persist.

use super::{AnswerSynthesizer, ContextCompressor, Evidence, EvidenceAnnotator};
use crate::audit::AuditSink;
use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::index::{DocumentIndex, IndexStore};
use crate::llm::{ChatApi, RetryPolicy};
use crate::models::{ChatTurn, PageCitation, QueryResponse};
use crate::ocr::TextRecognizer;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

pub struct QueryPipeline {
    compressor: ContextCompressor,
    synthesizer: AnswerSynthesizer,
    annotator: EvidenceAnnotator,
    index: Arc<dyn DocumentIndex>,
    store: Arc<IndexStore>,
    audit: Arc<dyn AuditSink>,
    top_k: usize,
}

impl QueryPipeline {
    pub fn new(
        chat: Arc<dyn ChatApi>,
        index: Arc<dyn DocumentIndex>,
        store: Arc<IndexStore>,
        ocr: Arc<dyn TextRecognizer>,
        audit: Arc<dyn AuditSink>,
        config: &AppConfig,
    ) -> Self {
        let retry = match config.llm.max_attempts {
            Some(max) => RetryPolicy::bounded(config.retry_backoff(), max),
            None => RetryPolicy::unbounded(config.retry_backoff()),
        };
        let temperature = config.llm.pipeline_temperature;

        Self {
            compressor: ContextCompressor::new(chat.clone(), retry.clone(), temperature),
            synthesizer: AnswerSynthesizer::new(chat, retry, temperature),
            annotator: EvidenceAnnotator::new(ocr, config.ocr.max_highlight_pages),
            index,
            store,
            audit,
            top_k: config.retrieval.top_k,
        }
    }

    /// Answer one conversation against `namespace`
    #[instrument(skip(self, conversation))]
    pub async fn answer(
        &self,
        namespace: &str,
        conversation: &[ChatTurn],
    ) -> Result<QueryResponse> {
        let start = Instant::now();

        let Some((current, history)) = conversation.split_last() else {
            return Err(AppError::NoMessages);
        };

        self.audit
            .record(format!("query namespace={} text={:?}", namespace, current.content));

        // 1. Compress history into the search query
        let query = self
            .compressor
            .compress(self.audit.as_ref(), history, &current.content)
            .await?;
        self.audit.record(format!("rewritten namespace={} text={:?}", namespace, query));

        // 2. Retrieve; an empty namespace never reaches the index service
        // or the synthesizer
        if !self.store.has_content(namespace) {
            return Err(AppError::EmptyIndex {
                namespace: namespace.to_string(),
            });
        }
        let hits = self.index.search(namespace, &query, self.top_k).await?;
        if hits.is_empty() {
            return Err(AppError::EmptyIndex {
                namespace: namespace.to_string(),
            });
        }

        let citation = PageCitation {
            doc_id: hits[0].doc_id.clone(),
            page: hits[0].page,
        };

        // 3. Synthesize over the evidence in retrieval order
        let evidence: Vec<Evidence> = hits.iter().filter_map(Evidence::from_hit).collect();
        let raw_answer = self
            .synthesizer
            .synthesize(self.audit.as_ref(), &query, &evidence)
            .await?;
        self.audit
            .record(format!("answer namespace={} text={:?}", namespace, raw_answer));

        // 4. Annotate: keyword extraction plus highlights on the top pages
        let evidence_images: Vec<String> = hits
            .iter()
            .filter_map(|h| h.image_base64.clone())
            .collect();
        let annotated = self
            .annotator
            .annotate(self.audit.as_ref(), &raw_answer, &evidence_images)
            .await?;

        crate::metrics::record_query(start.elapsed().as_secs_f64(), namespace, hits.len());
        info!(
            namespace,
            hits = hits.len(),
            keywords = annotated.keywords.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Query pipeline complete"
        );

        Ok(QueryResponse {
            answer: annotated.answer,
            citation: Some(citation),
            highlighted_images: if annotated.highlighted_images.is_empty() {
                None
            } else {
                Some(annotated.highlighted_images)
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::index::{IndexGeneration, PageHit};
    use crate::llm::ScriptedChatApi;
    use crate::ocr::{BoundingBox, FixedRecognizer, RecognizedWord};
    use async_trait::async_trait;
    use base64::Engine;

    struct FakeIndex {
        hits: Vec<PageHit>,
    }

    #[async_trait]
    impl DocumentIndex for FakeIndex {
        async fn index(&self, _source: &std::path::Path, _namespace: &str) -> Result<()> {
            Ok(())
        }

        async fn search(&self, _namespace: &str, _query: &str, k: usize) -> Result<Vec<PageHit>> {
            Ok(self.hits.iter().take(k).cloned().collect())
        }
    }

    fn page_png_base64() -> String {
        let img = image::RgbaImage::from_pixel(40, 20, image::Rgba([255, 255, 255, 255]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut out), image::ImageOutputFormat::Png)
            .unwrap();
        base64::engine::general_purpose::STANDARD.encode(out)
    }

    fn user_turn(content: &str) -> ChatTurn {
        ChatTurn {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }

    fn pipeline_with(
        chat: Arc<ScriptedChatApi>,
        hits: Vec<PageHit>,
        store: Arc<IndexStore>,
        words: Vec<RecognizedWord>,
    ) -> (QueryPipeline, Arc<MemoryAuditSink>) {
        let audit = MemoryAuditSink::new();
        let pipeline = QueryPipeline::new(
            chat,
            Arc::new(FakeIndex { hits }),
            store,
            Arc::new(FixedRecognizer::new(words)),
            audit.clone(),
            &AppConfig::default(),
        );
        (pipeline, audit)
    }

    #[tokio::test]
    async fn test_empty_conversation_rejected() {
        let store = IndexStore::new();
        let (pipeline, _) = pipeline_with(
            Arc::new(ScriptedChatApi::always("unused")),
            vec![],
            store,
            vec![],
        );

        let err = pipeline.answer("reports", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::NoMessages));
    }

    #[tokio::test]
    async fn test_empty_namespace_makes_no_llm_call() {
        let chat = Arc::new(ScriptedChatApi::always("unused"));
        let store = IndexStore::new();
        let (pipeline, _) = pipeline_with(chat.clone(), vec![], store, vec![]);

        let err = pipeline
            .answer("uploaded", &[user_turn("What was Q3 revenue?")])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::EmptyIndex { .. }));
        // Single-turn conversation: the compressor made no call either,
        // so no LLM call was issued anywhere
        assert_eq!(chat.calls(), 0);
    }

    #[tokio::test]
    async fn test_end_to_end_revenue_scenario() {
        let chat = Arc::new(ScriptedChatApi::always(
            "Revenue was $10M. **Keywords:** 'Q3', '$10M'",
        ));
        let store = IndexStore::new();
        store.replace(
            "reports",
            IndexGeneration::new(
                vec![crate::index::DocumentMeta {
                    doc_id: "q3-report".into(),
                    filename: "q3-report.pdf".into(),
                    page_count: 1,
                }],
                1,
            ),
        );

        let hits = vec![PageHit {
            doc_id: "q3-report".into(),
            page: 1,
            score: 0.92,
            image_base64: Some(page_png_base64()),
            text: Some("Q3 revenue was $10M".into()),
        }];
        let words = vec![
            RecognizedWord {
                text: "Q3".into(),
                bbox: BoundingBox {
                    left: 2,
                    top: 2,
                    width: 8,
                    height: 6,
                },
            },
            RecognizedWord {
                text: "$10M".into(),
                bbox: BoundingBox {
                    left: 20,
                    top: 2,
                    width: 12,
                    height: 6,
                },
            },
        ];
        let (pipeline, audit) = pipeline_with(chat.clone(), hits, store, words);

        let response = pipeline
            .answer("reports", &[user_turn("What was Q3 revenue?")])
            .await
            .unwrap();

        assert_eq!(response.answer, "Revenue was $10M.");
        assert_eq!(
            response.citation,
            Some(PageCitation {
                doc_id: "q3-report".into(),
                page: 1
            })
        );
        let images = response.highlighted_images.unwrap();
        assert_eq!(images.len(), 1);

        // Both keyword regions carry the highlight blend
        let png = base64::engine::general_purpose::STANDARD
            .decode(&images[0])
            .unwrap();
        let img = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(5, 4).0, [255, 255, 127, 255]);
        assert_eq!(img.get_pixel(25, 4).0, [255, 255, 127, 255]);
        // Untouched elsewhere
        assert_eq!(img.get_pixel(38, 18).0, [255, 255, 255, 255]);

        // One LLM call: single-turn skips compression, synthesis ran once
        assert_eq!(chat.calls(), 1);

        // Raw query, answer, and keywords were audited
        let events = audit.events();
        assert!(events.iter().any(|e| e.starts_with("query ")));
        assert!(events.iter().any(|e| e.starts_with("answer ")));
    }
}

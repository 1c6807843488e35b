//! Document index abstraction and generation store
//!
//! `DocumentIndex` is the narrow capability interface over whichever
//! embedding/retrieval backend serves page-level search; `IndexStore` owns
//! the per-namespace generation bookkeeping so index replacement is an
//! explicit copy-on-write pointer swap rather than ambient mutable state.

pub mod page_index;

pub use page_index::PageIndexClient;

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// One retrieval result: a page reference with its relevance score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageHit {
    pub doc_id: String,

    /// Page number, 1-indexed
    pub page: u32,

    /// Relevance score, higher is more relevant
    pub score: f32,

    /// Rendered page image (base64 PNG), when the backend serves images
    #[serde(default)]
    pub image_base64: Option<String>,

    /// Extracted page text, when the backend serves text
    #[serde(default)]
    pub text: Option<String>,
}

/// Retrieval/indexing capability over the external backend
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// (Re)index `source` (a PDF file or a corpus directory) into
    /// `namespace`, replacing any prior content of that namespace.
    async fn index(&self, source: &Path, namespace: &str) -> Result<()>;

    /// Return the `k` most relevant pages for `query`, in strictly
    /// decreasing relevance order with ties broken by insertion order.
    async fn search(&self, namespace: &str, query: &str, k: usize) -> Result<Vec<PageHit>>;
}

/// Sort hits by descending score, preserving insertion order on ties
pub fn rank_hits(mut hits: Vec<PageHit>) -> Vec<PageHit> {
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits
}

/// Immutable metadata of one indexed document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub doc_id: String,
    pub filename: String,
    pub page_count: usize,
}

/// One complete, internally consistent build of a namespace
#[derive(Debug, Clone)]
pub struct IndexGeneration {
    pub id: Uuid,
    pub documents: Vec<DocumentMeta>,

    /// Registered page chunks across all documents
    pub chunk_count: usize,
}

impl IndexGeneration {
    pub fn new(documents: Vec<DocumentMeta>, chunk_count: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            documents,
            chunk_count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunk_count == 0
    }
}

/// Owned namespace → generation map
///
/// Readers clone the `Arc` of the generation they start with; `replace`
/// swaps the pointer atomically, so an in-flight query keeps observing the
/// generation it loaded even while an upload rebuilds the namespace.
#[derive(Default)]
pub struct IndexStore {
    namespaces: RwLock<HashMap<String, Arc<IndexGeneration>>>,
}

impl IndexStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replace the namespace wholesale with a fresh generation
    pub fn replace(&self, namespace: &str, generation: IndexGeneration) -> Arc<IndexGeneration> {
        let generation = Arc::new(generation);
        self.namespaces
            .write()
            .expect("index store lock poisoned")
            .insert(namespace.to_string(), generation.clone());
        generation
    }

    /// Snapshot the current generation of a namespace, if any
    pub fn snapshot(&self, namespace: &str) -> Option<Arc<IndexGeneration>> {
        self.namespaces
            .read()
            .expect("index store lock poisoned")
            .get(namespace)
            .cloned()
    }

    /// Whether the namespace has at least one queryable chunk
    pub fn has_content(&self, namespace: &str) -> bool {
        self.snapshot(namespace)
            .map(|g| !g.is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(doc_id: &str, pages: usize) -> DocumentMeta {
        DocumentMeta {
            doc_id: doc_id.to_string(),
            filename: format!("{}.pdf", doc_id),
            page_count: pages,
        }
    }

    #[test]
    fn test_replace_swaps_generation_wholesale() {
        let store = IndexStore::new();

        store.replace("uploaded", IndexGeneration::new(vec![meta("a", 4)], 4));
        let first = store.snapshot("uploaded").unwrap();
        assert_eq!(first.chunk_count, 4);

        // A second upload replaces, never merges
        store.replace("uploaded", IndexGeneration::new(vec![meta("b", 2)], 2));
        let second = store.snapshot("uploaded").unwrap();
        assert_eq!(second.documents.len(), 1);
        assert_eq!(second.documents[0].doc_id, "b");
        assert_ne!(first.id, second.id);

        // The old snapshot is still internally consistent for readers
        assert_eq!(first.documents[0].doc_id, "a");
    }

    #[test]
    fn test_has_content() {
        let store = IndexStore::new();
        assert!(!store.has_content("reports"));

        store.replace("reports", IndexGeneration::new(vec![], 0));
        assert!(!store.has_content("reports"));

        store.replace("reports", IndexGeneration::new(vec![meta("r1", 10)], 10));
        assert!(store.has_content("reports"));
    }

    #[test]
    fn test_rank_hits_stable_on_ties() {
        let hit = |doc: &str, score: f32| PageHit {
            doc_id: doc.to_string(),
            page: 1,
            score,
            image_base64: None,
            text: None,
        };

        let ranked = rank_hits(vec![hit("a", 0.5), hit("b", 0.9), hit("c", 0.5)]);
        let order: Vec<&str> = ranked.iter().map(|h| h.doc_id.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }
}

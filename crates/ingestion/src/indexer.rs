//! Document indexer
//!
//! Orchestrates validation → delegation to the external page-index service
//! → generation registration. Re-indexing a namespace is destructive: the
//! fresh generation replaces everything previously queryable there.

use crate::errors::IngestionError;
use crate::pdf;
use reportlens_common::index::{DocumentIndex, DocumentMeta, IndexGeneration, IndexStore};
use reportlens_common::{REPORTS_NAMESPACE, UPLOADED_NAMESPACE};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Outcome of one upload
#[derive(Debug)]
pub struct UploadOutcome {
    pub document: DocumentMeta,

    /// Page chunks registered (pages with extractable content)
    pub chunks_added: usize,
}

/// Outcome of the startup corpus build
#[derive(Debug)]
pub struct CorpusOutcome {
    pub documents: usize,
    pub chunks: usize,
}

pub struct DocumentIndexer {
    index: Arc<dyn DocumentIndex>,
    store: Arc<IndexStore>,
    upload_dir: PathBuf,
}

impl DocumentIndexer {
    pub fn new(index: Arc<dyn DocumentIndex>, store: Arc<IndexStore>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            index,
            store,
            upload_dir: upload_dir.into(),
        }
    }

    /// Index one uploaded PDF into the uploaded namespace, replacing all
    /// previously uploaded content.
    ///
    /// Format validation happens before any file write or network call.
    #[instrument(skip(self, bytes))]
    pub async fn index_upload(
        &self,
        filename: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<UploadOutcome, IngestionError> {
        if content_type != "application/pdf" || !pdf::is_pdf(bytes) {
            return Err(IngestionError::UnsupportedFormat {
                content_type: content_type.to_string(),
            });
        }

        // Keep only the final path component of the client-supplied name
        let safe_name = Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload.pdf".to_string());

        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let path = self.upload_dir.join(&safe_name);
        tokio::fs::write(&path, bytes).await?;

        let pages = pdf::extract_pages(&path)?;
        let chunks_added = pages.iter().filter(|p| !p.text.trim().is_empty()).count();
        if chunks_added == 0 {
            return Err(IngestionError::EmptyDocument {
                filename: safe_name,
            });
        }

        // Embedding computation is the index service's concern
        self.index.index(&path, UPLOADED_NAMESPACE).await?;

        let document = DocumentMeta {
            doc_id: Path::new(&safe_name)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| safe_name.clone()),
            filename: safe_name,
            page_count: pages.len(),
        };
        let generation = IndexGeneration::new(vec![document.clone()], chunks_added);
        self.store.replace(UPLOADED_NAMESPACE, generation);

        info!(
            doc_id = %document.doc_id,
            pages = document.page_count,
            chunks = chunks_added,
            "Uploaded document indexed"
        );

        Ok(UploadOutcome {
            document,
            chunks_added,
        })
    }

    /// Rebuild the reports namespace from the fixed corpus directory.
    ///
    /// Runs once at startup. Documents that fail to parse are skipped with
    /// a warning; a missing or empty directory leaves the namespace
    /// unregistered.
    pub async fn index_corpus(&self, dir: &Path) -> Result<CorpusOutcome, IngestionError> {
        let mut pdfs: Vec<PathBuf> = match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.extension()
                        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                        .unwrap_or(false)
                })
                .collect(),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Reports corpus directory unavailable");
                return Ok(CorpusOutcome {
                    documents: 0,
                    chunks: 0,
                });
            }
        };
        pdfs.sort();

        let mut documents = Vec::new();
        let mut chunks = 0usize;
        for path in &pdfs {
            let pages = match pdf::extract_pages(path) {
                Ok(pages) => pages,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping corpus document");
                    continue;
                }
            };
            let non_empty = pages.iter().filter(|p| !p.text.trim().is_empty()).count();
            if non_empty == 0 {
                warn!(path = %path.display(), "Skipping corpus document with no extractable content");
                continue;
            }

            chunks += non_empty;
            documents.push(DocumentMeta {
                doc_id: path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default(),
                filename: path
                    .file_name()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default(),
                page_count: pages.len(),
            });
        }

        if documents.is_empty() {
            warn!(dir = %dir.display(), "Reports corpus contains no indexable documents");
            return Ok(CorpusOutcome {
                documents: 0,
                chunks: 0,
            });
        }

        // One index build for the whole directory
        self.index.index(dir, REPORTS_NAMESPACE).await?;

        let count = documents.len();
        self.store
            .replace(REPORTS_NAMESPACE, IndexGeneration::new(documents, chunks));

        info!(documents = count, chunks, "Reports corpus indexed");
        Ok(CorpusOutcome {
            documents: count,
            chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::testing::sample_pdf;
    use async_trait::async_trait;
    use reportlens_common::errors::Result as CommonResult;
    use reportlens_common::index::PageHit;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingIndex {
        index_calls: AtomicUsize,
    }

    #[async_trait]
    impl DocumentIndex for RecordingIndex {
        async fn index(&self, _source: &Path, _namespace: &str) -> CommonResult<()> {
            self.index_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn search(
            &self,
            _namespace: &str,
            _query: &str,
            _k: usize,
        ) -> CommonResult<Vec<PageHit>> {
            Ok(vec![])
        }
    }

    fn pdf_bytes(texts: &[&str]) -> Vec<u8> {
        let mut doc = sample_pdf(texts);
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[tokio::test]
    async fn test_non_pdf_rejected_before_any_index_call() {
        let index = Arc::new(RecordingIndex::default());
        let store = IndexStore::new();
        let dir = tempfile::tempdir().unwrap();
        let indexer = DocumentIndexer::new(index.clone(), store, dir.path());

        let err = indexer
            .index_upload("notes.txt", "text/plain", b"plain text")
            .await
            .unwrap_err();

        assert!(matches!(err, IngestionError::UnsupportedFormat { .. }));
        assert_eq!(index.index_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pdf_content_type_with_wrong_magic_rejected() {
        let index = Arc::new(RecordingIndex::default());
        let store = IndexStore::new();
        let dir = tempfile::tempdir().unwrap();
        let indexer = DocumentIndexer::new(index.clone(), store, dir.path());

        let err = indexer
            .index_upload("fake.pdf", "application/pdf", b"GIF89a not a pdf")
            .await
            .unwrap_err();

        assert!(matches!(err, IngestionError::UnsupportedFormat { .. }));
        assert_eq!(index.index_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upload_replaces_previous_generation() {
        let index = Arc::new(RecordingIndex::default());
        let store = IndexStore::new();
        let dir = tempfile::tempdir().unwrap();
        let indexer = DocumentIndexer::new(index.clone(), store.clone(), dir.path());

        let first = indexer
            .index_upload(
                "first.pdf",
                "application/pdf",
                &pdf_bytes(&["Q3 revenue was $10M", "Costs fell"]),
            )
            .await
            .unwrap();
        assert_eq!(first.chunks_added, 2);
        assert_eq!(first.document.doc_id, "first");

        let second = indexer
            .index_upload(
                "second.pdf",
                "application/pdf",
                &pdf_bytes(&["A single page"]),
            )
            .await
            .unwrap();
        assert_eq!(second.chunks_added, 1);

        // Wholesale replacement, never additive
        let generation = store.snapshot(UPLOADED_NAMESPACE).unwrap();
        assert_eq!(generation.documents.len(), 1);
        assert_eq!(generation.documents[0].doc_id, "second");
        assert_eq!(generation.chunk_count, 1);
        assert_eq!(index.index_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_corpus_build_registers_reports_generation() {
        let index = Arc::new(RecordingIndex::default());
        let store = IndexStore::new();
        let upload_dir = tempfile::tempdir().unwrap();
        let corpus_dir = tempfile::tempdir().unwrap();
        let indexer = DocumentIndexer::new(index.clone(), store.clone(), upload_dir.path());

        sample_pdf(&["Annual report page"])
            .save(corpus_dir.path().join("annual.pdf"))
            .unwrap();
        sample_pdf(&["Quarterly report page one", "page two"])
            .save(corpus_dir.path().join("quarterly.pdf"))
            .unwrap();
        // Non-PDF files are ignored
        std::fs::write(corpus_dir.path().join("readme.txt"), "ignore me").unwrap();

        let outcome = indexer.index_corpus(corpus_dir.path()).await.unwrap();
        assert_eq!(outcome.documents, 2);
        assert_eq!(outcome.chunks, 3);
        assert!(store.has_content(REPORTS_NAMESPACE));
        assert_eq!(index.index_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_corpus_directory_is_tolerated() {
        let index = Arc::new(RecordingIndex::default());
        let store = IndexStore::new();
        let upload_dir = tempfile::tempdir().unwrap();
        let indexer = DocumentIndexer::new(index, store.clone(), upload_dir.path());

        let outcome = indexer
            .index_corpus(Path::new("/nonexistent/reports"))
            .await
            .unwrap();
        assert_eq!(outcome.documents, 0);
        assert!(!store.has_content(REPORTS_NAMESPACE));
    }
}

//! Query pipeline core components
//!
//! A query flows strictly compressor → retrieval → synthesizer → annotator:
//! - Context compression of multi-turn history into a search query
//! - Page retrieval through the document index capability
//! - Grounded answer synthesis over the retrieved evidence
//! - Keyword extraction and evidence highlighting on page images

mod annotator;
mod compressor;
mod pipeline;
mod synthesizer;

pub use annotator::{extract_keywords, remove_keywords, Annotated, EvidenceAnnotator};
pub use compressor::ContextCompressor;
pub use pipeline::QueryPipeline;
pub use synthesizer::{AnswerSynthesizer, Evidence};

//! Evidence annotator
//!
//! Post-processes the synthesized answer: parses the delimited keyword
//! section out of the answer text and overlays semi-transparent highlights
//! on the top retrieved page images wherever OCR finds a cited keyword.

use crate::audit::AuditSink;
use crate::errors::{AppError, Result};
use crate::ocr::{BoundingBox, RecognizedWord, TextRecognizer};
use base64::Engine;
use image::RgbaImage;
use regex_lite::Regex;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Highlight color (yellow) and alpha, matching a text-marker overlay
const HIGHLIGHT_RGB: [u8; 3] = [255, 255, 0];
const HIGHLIGHT_ALPHA: u32 = 128;

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\*\*keywords:\*\*").expect("valid marker regex"))
}

fn keywords_tail_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\*\*keywords:\*\*\s*(.+)").expect("valid keywords regex"))
}

fn quoted_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"'([^']+)'").expect("valid quoted regex"))
}

/// Parse the single-quoted tokens after a case-insensitive `**Keywords:**`
/// marker; an absent marker yields an empty set.
pub fn extract_keywords(answer: &str) -> Vec<String> {
    let Some(caps) = keywords_tail_regex().captures(answer) else {
        return Vec::new();
    };
    let tail = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

    quoted_regex()
        .captures_iter(tail)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Strip the keyword marker and everything after it, trimming trailing
/// whitespace; an answer without the marker passes through unchanged.
pub fn remove_keywords(answer: &str) -> String {
    match marker_regex().find(answer) {
        Some(m) => answer[..m.start()].trim_end().to_string(),
        None => answer.to_string(),
    }
}

/// Lowercase and drop all internal whitespace
fn normalize(s: &str) -> String {
    s.to_lowercase().split_whitespace().collect()
}

/// Annotation result: the cleaned answer plus highlighted page images
#[derive(Debug)]
pub struct Annotated {
    pub answer: String,
    pub keywords: Vec<String>,
    pub highlighted_images: Vec<String>,
}

pub struct EvidenceAnnotator {
    ocr: Arc<dyn TextRecognizer>,

    /// How many top evidence images receive highlights
    max_pages: usize,
}

impl EvidenceAnnotator {
    pub fn new(ocr: Arc<dyn TextRecognizer>, max_pages: usize) -> Self {
        Self { ocr, max_pages }
    }

    /// Extract keywords from `answer` and highlight them on up to the
    /// first `max_pages` evidence images.
    ///
    /// With zero keywords no recognition or drawing work happens at all.
    pub async fn annotate(
        &self,
        audit: &dyn AuditSink,
        answer: &str,
        evidence_images: &[String],
    ) -> Result<Annotated> {
        let keywords = extract_keywords(answer);
        let clean = remove_keywords(answer);

        if keywords.is_empty() {
            return Ok(Annotated {
                answer: clean,
                keywords,
                highlighted_images: Vec::new(),
            });
        }

        audit.record(format!("keywords extracted={:?}", keywords));
        let normalized: Vec<String> = keywords.iter().map(|k| normalize(k)).collect();

        let mut highlighted_images = Vec::with_capacity(self.max_pages.min(evidence_images.len()));
        for b64 in evidence_images.iter().take(self.max_pages) {
            let png = decode_image_base64(b64)?;
            let words = self.ocr.recognize(&png).await?;
            debug!(words = words.len(), "OCR complete");

            let out = highlight_words(&png, &words, &normalized)?;
            highlighted_images.push(base64::engine::general_purpose::STANDARD.encode(out));
        }

        Ok(Annotated {
            answer: clean,
            keywords,
            highlighted_images,
        })
    }
}

/// Decode a base64 image, tolerating a data-URL header
fn decode_image_base64(b64: &str) -> Result<Vec<u8>> {
    let payload = match b64.split_once(',') {
        Some((header, rest)) if header.starts_with("data:image") => rest,
        _ => b64,
    };
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| AppError::Internal {
            message: format!("Invalid evidence image encoding: {}", e),
        })
}

/// Draw a highlight over every recognized word whose normalized form
/// contains any normalized keyword, returning the image re-encoded as PNG.
fn highlight_words(
    png: &[u8],
    words: &[RecognizedWord],
    normalized_keywords: &[String],
) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(png).map_err(|e| AppError::Internal {
        message: format!("Failed to decode evidence image: {}", e),
    })?;
    let mut img = decoded.to_rgba8();

    for word in words {
        let word_norm = normalize(&word.text);
        if word_norm.is_empty() {
            continue;
        }
        if normalized_keywords.iter().any(|k| word_norm.contains(k.as_str())) {
            blend_highlight(&mut img, &word.bbox);
        }
    }

    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageOutputFormat::Png)
        .map_err(|e| AppError::Internal {
            message: format!("Failed to encode highlighted image: {}", e),
        })?;
    Ok(out)
}

/// Alpha-blend the highlight color over one bounding box, clamped to the
/// image bounds
fn blend_highlight(img: &mut RgbaImage, bbox: &BoundingBox) {
    let (width, height) = img.dimensions();
    let right = bbox.left.saturating_add(bbox.width).min(width);
    let bottom = bbox.top.saturating_add(bbox.height).min(height);

    for y in bbox.top..bottom {
        for x in bbox.left..right {
            let pixel = img.get_pixel_mut(x, y);
            for channel in 0..3 {
                let src = pixel.0[channel] as u32;
                let overlay = HIGHLIGHT_RGB[channel] as u32;
                pixel.0[channel] =
                    ((src * (255 - HIGHLIGHT_ALPHA) + overlay * HIGHLIGHT_ALPHA) / 255) as u8;
            }
        }
    }
}

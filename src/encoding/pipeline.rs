use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::error::AppResult;
use crate::services::pdf_extractor::{DocumentExtractor, DocumentInfo, ExtractedContent};

use super::{encode_image, encode_text, normalize_image, normalize_text, BitString, EncodingOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Image,
    Text,
}

/// Position of one content item inside the document bit-string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentLayout {
    pub kind: SegmentKind,
    /// Index in extraction order among items of the same kind.
    pub index: usize,
    pub bit_offset: usize,
    pub bit_length: usize,
}

#[derive(Debug, Clone)]
pub struct EncodedDocument {
    pub bits: BitString,
    pub images: usize,
    pub texts: usize,
    pub segments: Vec<SegmentLayout>,
    pub info: DocumentInfo,
}

/// Runs extraction, normalization and binary encoding for whole documents.
///
/// Holds no per-document state, so one encoder can serve concurrent requests.
#[derive(Clone)]
pub struct DocumentEncoder {
    extractor: Arc<dyn DocumentExtractor>,
    options: EncodingOptions,
}

impl DocumentEncoder {
    pub fn new(extractor: Arc<dyn DocumentExtractor>, options: EncodingOptions) -> Self {
        Self { extractor, options }
    }

    pub fn options(&self) -> &EncodingOptions {
        &self.options
    }

    pub fn encode_document(&self, document: &[u8]) -> AppResult<EncodedDocument> {
        let start = Instant::now();
        let content = self.extractor.extract(document)?;

        info!(
            images = content.images.len(),
            texts = content.texts.len(),
            "Extracted document content"
        );

        let encoded = self.encode_content(&content)?;

        info!(
            bit_length = encoded.bits.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Document encoded"
        );
        Ok(encoded)
    }

    /// Encodes all images in order, then all texts in order.
    pub fn encode_content(&self, content: &ExtractedContent) -> AppResult<EncodedDocument> {
        let total_bits = self
            .options
            .expected_bits(content.images.len(), content.texts.len());
        let mut bits = BitString::with_byte_capacity(total_bits / 8);
        let mut segments = Vec::with_capacity(content.images.len() + content.texts.len());

        for (index, image) in content.images.iter().enumerate() {
            let tensor = normalize_image(image, self.options.image_size);
            let segment = encode_image(&tensor);
            debug!(index, width = image.width(), height = image.height(), "Encoded image segment");
            segments.push(SegmentLayout {
                kind: SegmentKind::Image,
                index,
                bit_offset: bits.len(),
                bit_length: segment.len(),
            });
            bits.append(&segment);
        }

        for (index, text) in content.texts.iter().enumerate() {
            let codes = normalize_text(text, self.options.text_length);
            let segment = encode_text(&codes, self.options.policy)?;
            debug!(index, chars = text.chars().count(), "Encoded text segment");
            segments.push(SegmentLayout {
                kind: SegmentKind::Text,
                index,
                bit_offset: bits.len(),
                bit_length: segment.len(),
            });
            bits.append(&segment);
        }

        Ok(EncodedDocument {
            bits,
            images: content.images.len(),
            texts: content.texts.len(),
            segments,
            info: content.info.clone(),
        })
    }
}

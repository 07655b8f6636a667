use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::encoding::{EncodedDocument, EncodingOptions, NarrowingPolicy, SegmentLayout};
use crate::services::pdf_extractor::DocumentInfo;

/// Sidecar describing how an artifact's bit-string is laid out.
///
/// The artifact itself carries no header, so this is the only record of
/// segment boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub source_name: String,
    pub artifact_name: String,
    pub document: DocumentInfo,
    pub image_count: usize,
    pub text_count: usize,
    pub bit_length: usize,
    pub image_size: [u32; 2],
    pub text_length: usize,
    pub code_point_policy: NarrowingPolicy,
    pub segments: Vec<SegmentLayout>,
    pub created_at: DateTime<Utc>,
}

impl Manifest {
    pub fn new(
        source_name: impl Into<String>,
        artifact_name: impl Into<String>,
        encoded: &EncodedDocument,
        options: &EncodingOptions,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            artifact_name: artifact_name.into(),
            document: encoded.info.clone(),
            image_count: encoded.images,
            text_count: encoded.texts,
            bit_length: encoded.bits.len(),
            image_size: [options.image_size.0, options.image_size.1],
            text_length: options.text_length,
            code_point_policy: options.policy,
            segments: encoded.segments.clone(),
            created_at: Utc::now(),
        }
    }
}

//! Content-to-binary encoding pipeline.
//!
//! Every image becomes a fixed `IMAGE_SIZE x IMAGE_SIZE x 3` byte segment and
//! every text block a fixed `TEXT_LENGTH` byte segment. Segments are written
//! as ASCII bit-strings, eight characters per byte, most significant bit first.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod binary;
pub mod image_normalizer;
pub mod pipeline;
pub mod text_normalizer;

pub use binary::{encode_bytes, encode_image, encode_text, narrow_code_points, tensor_to_bytes, BitString};
pub use image_normalizer::{normalize_image, ImageTensor, RESAMPLE_FILTER};
pub use pipeline::{DocumentEncoder, EncodedDocument, SegmentKind, SegmentLayout};
pub use text_normalizer::{normalize_text, PAD_CHAR};

pub const DEFAULT_IMAGE_SIZE: u32 = 128;
pub const DEFAULT_TEXT_LENGTH: usize = 500;
pub const CHANNELS: usize = 3;

/// How text code points above 255 are narrowed to a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NarrowingPolicy {
    /// Keep the low 8 bits of the code point.
    #[default]
    Mask,
    /// Fail with an encoding error naming the offending code point.
    Reject,
}

impl fmt::Display for NarrowingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NarrowingPolicy::Mask => f.write_str("mask"),
            NarrowingPolicy::Reject => f.write_str("reject"),
        }
    }
}

impl FromStr for NarrowingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mask" => Ok(NarrowingPolicy::Mask),
            "reject" => Ok(NarrowingPolicy::Reject),
            other => Err(format!("unknown code point policy '{}', expected 'mask' or 'reject'", other)),
        }
    }
}

/// Shape parameters shared by every document encoded with one configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingOptions {
    pub image_size: (u32, u32),
    pub text_length: usize,
    pub policy: NarrowingPolicy,
}

impl Default for EncodingOptions {
    fn default() -> Self {
        Self {
            image_size: (DEFAULT_IMAGE_SIZE, DEFAULT_IMAGE_SIZE),
            text_length: DEFAULT_TEXT_LENGTH,
            policy: NarrowingPolicy::default(),
        }
    }
}

impl EncodingOptions {
    /// Bytes contributed by one image segment.
    pub fn image_segment_bytes(&self) -> usize {
        self.image_size.0 as usize * self.image_size.1 as usize * CHANNELS
    }

    /// Bytes contributed by one text segment.
    pub fn text_segment_bytes(&self) -> usize {
        self.text_length
    }

    /// Expected bit-string length for a document with the given content counts.
    pub fn expected_bits(&self, images: usize, texts: usize) -> usize {
        8 * (self.image_segment_bytes() * images + self.text_segment_bytes() * texts)
    }
}

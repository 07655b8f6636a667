use std::fmt::{self, Write as _};

use crate::error::{AppError, AppResult};

use super::{ImageTensor, NarrowingPolicy};

/// An ASCII string of `'0'`/`'1'` characters whose length is always a
/// multiple of eight. Each group of eight encodes one byte, MSB first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitString(String);

impl BitString {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_byte_capacity(bytes: usize) -> Self {
        Self(String::with_capacity(bytes * 8))
    }

    pub fn push_byte(&mut self, byte: u8) {
        // Writing into a String cannot fail
        let _ = write!(self.0, "{:08b}", byte);
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.0.reserve(bytes.len() * 8);
        for &byte in bytes {
            self.push_byte(byte);
        }
    }

    pub fn append(&mut self, other: &BitString) {
        self.0.push_str(&other.0);
    }

    /// Length in bits (characters).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn byte_len(&self) -> usize {
        self.0.len() / 8
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Decodes the bit-string back into bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0
            .as_bytes()
            .chunks_exact(8)
            .map(|chunk| chunk.iter().fold(0u8, |acc, &bit| (acc << 1) | (bit - b'0')))
            .collect()
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<[u8]> for BitString {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// Formats every byte as eight characters, most significant bit first.
pub fn encode_bytes(values: &[u8]) -> BitString {
    let mut bits = BitString::with_byte_capacity(values.len());
    bits.push_bytes(values);
    bits
}

/// Rescales `[0.0, 1.0]` intensities back to bytes by multiplying by 255 and
/// truncating. Out-of-range values saturate at 0 and 255.
pub fn tensor_to_bytes(tensor: &ImageTensor) -> Vec<u8> {
    tensor.values().iter().map(|&v| (v * 255.0) as u8).collect()
}

/// Narrows code points to bytes according to `policy`.
pub fn narrow_code_points(codes: &[u32], policy: NarrowingPolicy) -> AppResult<Vec<u8>> {
    codes
        .iter()
        .enumerate()
        .map(|(position, &code_point)| match policy {
            NarrowingPolicy::Mask => Ok((code_point & 0xFF) as u8),
            NarrowingPolicy::Reject => u8::try_from(code_point)
                .map_err(|_| AppError::Encoding { code_point, position }),
        })
        .collect()
}

pub fn encode_image(tensor: &ImageTensor) -> BitString {
    encode_bytes(&tensor_to_bytes(tensor))
}

pub fn encode_text(codes: &[u32], policy: NarrowingPolicy) -> AppResult<BitString> {
    Ok(encode_bytes(&narrow_code_points(codes, policy)?))
}

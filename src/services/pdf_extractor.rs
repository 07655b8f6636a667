use std::collections::HashSet;
use std::time::Instant;

use image::{ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

// Resource and form nesting deeper than this is treated as a malformed document
const MAX_NESTING: usize = 16;

/// Document-level information recorded alongside the encoded artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub pages: usize,
    pub title: Option<String>,
    pub author: Option<String>,
}

/// Content pulled out of a document, in extraction order.
#[derive(Debug, Clone, Default)]
pub struct ExtractedContent {
    pub images: Vec<RgbImage>,
    pub texts: Vec<String>,
    pub info: DocumentInfo,
}

/// Splits a document into its raster images and text blocks.
///
/// Implementations must yield a stable order for a given input.
pub trait DocumentExtractor: Send + Sync {
    fn extract(&self, document: &[u8]) -> AppResult<ExtractedContent>;
}

/// Extracts page text and image XObjects with lopdf, decoding images with `image`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl LopdfExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Check if the extractor is available
    pub fn is_available(&self) -> bool {
        // Pure Rust, nothing to probe on the host
        true
    }
}

impl DocumentExtractor for LopdfExtractor {
    fn extract(&self, document: &[u8]) -> AppResult<ExtractedContent> {
        let start = Instant::now();
        tracing::debug!("Loading PDF ({} bytes)", document.len());

        let doc = Document::load_mem(document)
            .map_err(|e| AppError::extraction(format!("Failed to open PDF: {}", e)))?;

        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(AppError::extraction("PDF has no pages"));
        }

        let mut content = ExtractedContent {
            info: DocumentInfo {
                pages: pages.len(),
                title: info_string(&doc, b"Title"),
                author: info_string(&doc, b"Author"),
            },
            ..Default::default()
        };

        for (&page_number, &page_id) in &pages {
            let text = doc.extract_text(&[page_number]).map_err(|e| {
                AppError::extraction(format!("Failed to extract text from page {}: {}", page_number, e))
            })?;
            if !text.is_empty() {
                content.texts.push(text);
            }

            let before = content.images.len();
            if let Some(resources) = page_resources(&doc, page_id)? {
                let mut visited = HashSet::new();
                collect_images(&doc, resources, &mut content.images, &mut visited, 0)?;
            }
            tracing::debug!(
                page = page_number,
                images = content.images.len() - before,
                "Processed page"
            );
        }

        tracing::info!(
            "PDF extraction completed in {}ms: {} pages, {} images, {} text blocks",
            start.elapsed().as_millis(),
            content.info.pages,
            content.images.len(),
            content.texts.len()
        );
        Ok(content)
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> AppResult<&'a Object> {
    match obj {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

/// Finds the page's resource dictionary, following `/Parent` for inherited resources.
fn page_resources(doc: &Document, page_id: ObjectId) -> AppResult<Option<&Dictionary>> {
    let mut node = doc.get_object(page_id)?.as_dict()?;
    for _ in 0..MAX_NESTING {
        if let Ok(resources) = node.get(b"Resources") {
            return Ok(Some(resolve(doc, resources)?.as_dict()?));
        }
        match node.get(b"Parent") {
            Ok(parent) => node = resolve(doc, parent)?.as_dict()?,
            Err(_) => return Ok(None),
        }
    }
    Err(AppError::extraction("Page tree nesting too deep"))
}

/// Appends every image XObject in `resources`, descending into form XObjects.
fn collect_images(
    doc: &Document,
    resources: &Dictionary,
    images: &mut Vec<RgbImage>,
    visited: &mut HashSet<ObjectId>,
    depth: usize,
) -> AppResult<()> {
    if depth > MAX_NESTING {
        return Err(AppError::extraction("Form XObject nesting too deep"));
    }
    let xobjects = match resources.get(b"XObject") {
        Ok(obj) => resolve(doc, obj)?.as_dict()?,
        Err(_) => return Ok(()),
    };

    for (name, entry) in xobjects.iter() {
        let id = entry.as_reference().ok();
        let stream = match resolve(doc, entry)?.as_stream() {
            Ok(stream) => stream,
            Err(_) => continue,
        };
        let subtype = stream.dict.get(b"Subtype").and_then(Object::as_name).unwrap_or_default();

        match subtype {
            b"Image" => {
                let image = decode_image(doc, stream).map_err(|e| match e {
                    AppError::Extraction { message } => AppError::extraction(format!(
                        "Image /{} ({:?}): {}",
                        String::from_utf8_lossy(name),
                        id,
                        message
                    )),
                    other => other,
                })?;
                images.push(image);
            }
            b"Form" => {
                // Forms reused on one page are walked once
                if let Some(id) = id {
                    if !visited.insert(id) {
                        continue;
                    }
                }
                if let Ok(form_resources) = stream.dict.get(b"Resources") {
                    let form_resources = resolve(doc, form_resources)?.as_dict()?;
                    collect_images(doc, form_resources, images, visited, depth + 1)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn filter_names(doc: &Document, dict: &Dictionary) -> AppResult<Vec<Vec<u8>>> {
    let filter = match dict.get(b"Filter") {
        Ok(obj) => resolve(doc, obj)?,
        Err(_) => return Ok(Vec::new()),
    };
    match filter {
        Object::Name(name) => Ok(vec![name.clone()]),
        Object::Array(items) => items
            .iter()
            .map(|item| -> AppResult<Vec<u8>> { Ok(resolve(doc, item)?.as_name()?.to_vec()) })
            .collect(),
        _ => Err(AppError::extraction("Malformed /Filter entry")),
    }
}

fn dimension(dict: &Dictionary, key: &[u8]) -> AppResult<u32> {
    let value = dict
        .get(key)
        .and_then(Object::as_i64)
        .map_err(|_| AppError::extraction(format!("Missing /{}", String::from_utf8_lossy(key))))?;
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| AppError::extraction(format!("Invalid /{} {}", String::from_utf8_lossy(key), value)))
}

const SUPPORTED_DEPTHS: [u8; 5] = [1, 2, 4, 8, 16];

/// Colour spaces image samples can be expanded from.
#[derive(Debug, Clone, PartialEq)]
enum ColourSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Palette of `hival + 1` entries, each one 8-bit pixel in `base`.
    Indexed {
        base: Box<ColourSpace>,
        hival: u8,
        lookup: Vec<u8>,
    },
}

impl ColourSpace {
    fn components(&self) -> usize {
        match self {
            ColourSpace::Gray | ColourSpace::Indexed { .. } => 1,
            ColourSpace::Rgb => 3,
            ColourSpace::Cmyk => 4,
        }
    }

    fn is_indexed(&self) -> bool {
        matches!(self, ColourSpace::Indexed { .. })
    }

    fn default_decode(&self, bits: u8) -> (f32, f32) {
        match self {
            ColourSpace::Indexed { .. } => (0.0, max_sample(bits) as f32),
            _ => (0.0, 1.0),
        }
    }

    /// Converts one pixel of 8-bit components (or one palette index) to RGB.
    fn to_rgb(&self, px: &[u8]) -> [u8; 3] {
        match (self, px) {
            (ColourSpace::Indexed { base, hival, lookup }, [index]) => {
                let n = base.components();
                let start = usize::from((*index).min(*hival)) * n;
                base.to_rgb(&lookup[start..start + n])
            }
            (_, [g]) => [*g, *g, *g],
            (_, [r, g, b]) => [*r, *g, *b],
            (_, [c, m, y, k]) => {
                let ink = |v: u8| ((255 - u16::from(v)) * (255 - u16::from(*k)) / 255) as u8;
                [ink(*c), ink(*m), ink(*y)]
            }
            _ => unreachable!("pixel width always matches the component count"),
        }
    }
}

fn decode_image(doc: &Document, stream: &Stream) -> AppResult<RgbImage> {
    let dict = &stream.dict;
    let filters = filter_names(doc, dict)?;

    if filters.last().map(Vec::as_slice) == Some(b"DCTDecode".as_slice()) {
        if filters.len() != 1 {
            return Err(AppError::extraction("Chained filters before DCTDecode are not supported"));
        }
        let decoded = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)?;
        return Ok(decoded.to_rgb8());
    }

    if let Some(unsupported) = filters.iter().find(|f| {
        matches!(f.as_slice(), b"JPXDecode" | b"JBIG2Decode" | b"CCITTFaxDecode")
    }) {
        return Err(AppError::extraction(format!(
            "Unsupported image filter {}",
            String::from_utf8_lossy(unsupported)
        )));
    }

    let width = dimension(dict, b"Width")?;
    let height = dimension(dict, b"Height")?;
    let image_mask = dict.get(b"ImageMask").and_then(Object::as_bool).unwrap_or(false);
    let (space, bits) = if image_mask {
        (ColourSpace::Gray, 1)
    } else {
        let colour_space_entry = dict
            .get(b"ColorSpace")
            .map_err(|_| AppError::extraction("Missing /ColorSpace"))?;
        let bits = dict.get(b"BitsPerComponent").and_then(Object::as_i64).unwrap_or(8);
        (colour_space(doc, colour_space_entry)?, sample_depth(bits)?)
    };
    let decode = decode_ranges(doc, dict, &space, bits)?;

    let samples = if filters.is_empty() {
        stream.content.clone()
    } else {
        stream.decompressed_content()?
    };

    samples_to_rgb(width, height, &space, bits, decode.as_deref(), &samples)
}

fn sample_depth(bits: i64) -> AppResult<u8> {
    u8::try_from(bits)
        .ok()
        .filter(|b| SUPPORTED_DEPTHS.contains(b))
        .ok_or_else(|| AppError::extraction(format!("Unsupported bits per component {}", bits)))
}

fn colour_space(doc: &Document, entry: &Object) -> AppResult<ColourSpace> {
    match resolve(doc, entry)? {
        Object::Name(name) => named_colour_space(name),
        Object::Array(items) => {
            let family = items
                .first()
                .map(|f| resolve(doc, f))
                .transpose()?
                .and_then(|f| f.as_name().ok())
                .unwrap_or_default();
            match family {
                b"ICCBased" => {
                    let profile = items
                        .get(1)
                        .ok_or_else(|| AppError::extraction("ICCBased colour space without profile"))?;
                    let n = resolve(doc, profile)?.as_stream()?.dict.get(b"N")?.as_i64()?;
                    match n {
                        1 => Ok(ColourSpace::Gray),
                        3 => Ok(ColourSpace::Rgb),
                        4 => Ok(ColourSpace::Cmyk),
                        _ => Err(AppError::extraction(format!("Unsupported ICC component count {}", n))),
                    }
                }
                b"Indexed" | b"I" => indexed_colour_space(doc, &items[1..]),
                other => named_colour_space(other),
            }
        }
        _ => Err(AppError::extraction("Malformed /ColorSpace entry")),
    }
}

fn named_colour_space(name: &[u8]) -> AppResult<ColourSpace> {
    match name {
        b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(ColourSpace::Rgb),
        b"DeviceGray" | b"CalGray" | b"G" => Ok(ColourSpace::Gray),
        b"DeviceCMYK" | b"CMYK" => Ok(ColourSpace::Cmyk),
        other => Err(AppError::extraction(format!(
            "Unsupported colour space {}",
            String::from_utf8_lossy(other)
        ))),
    }
}

/// `[/Indexed base hival lookup]`, where lookup is a string or a stream.
fn indexed_colour_space(doc: &Document, params: &[Object]) -> AppResult<ColourSpace> {
    let [base, hival, lookup] = params else {
        return Err(AppError::extraction("Indexed colour space needs a base, hival and lookup"));
    };

    let base = colour_space(doc, base)?;
    if base.is_indexed() {
        return Err(AppError::extraction("Indexed colour space over an indexed base"));
    }
    let hival = resolve(doc, hival)?.as_i64()?;
    let hival = u8::try_from(hival)
        .map_err(|_| AppError::extraction(format!("Invalid Indexed hival {}", hival)))?;

    let lookup = match resolve(doc, lookup)? {
        Object::String(bytes, _) => bytes.clone(),
        Object::Stream(stream) if stream.dict.has(b"Filter") => stream.decompressed_content()?,
        Object::Stream(stream) => stream.content.clone(),
        _ => return Err(AppError::extraction("Malformed Indexed lookup table")),
    };
    let needed = (usize::from(hival) + 1) * base.components();
    if lookup.len() < needed {
        return Err(AppError::extraction(format!(
            "Indexed lookup table truncated: expected {} bytes, got {}",
            needed,
            lookup.len()
        )));
    }

    Ok(ColourSpace::Indexed {
        base: Box::new(base),
        hival,
        lookup,
    })
}

/// Reads `/Decode` as one range per component. `None` when absent or equal to the default.
fn decode_ranges(doc: &Document, dict: &Dictionary, space: &ColourSpace, bits: u8) -> AppResult<Option<Vec<(f32, f32)>>> {
    let items = match dict.get(b"Decode") {
        Ok(obj) => resolve(doc, obj)?.as_array()?,
        Err(_) => return Ok(None),
    };
    let values = items
        .iter()
        .map(|item| -> AppResult<f32> {
            match resolve(doc, item)? {
                Object::Integer(i) => Ok(*i as f32),
                Object::Real(r) => Ok(*r as f32),
                _ => Err(AppError::extraction("Non-numeric /Decode entry")),
            }
        })
        .collect::<AppResult<Vec<f32>>>()?;

    if values.len() != 2 * space.components() {
        return Err(AppError::extraction(format!(
            "/Decode has {} entries, expected {}",
            values.len(),
            2 * space.components()
        )));
    }

    let ranges: Vec<(f32, f32)> = values.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect();
    let default = space.default_decode(bits);
    if ranges.iter().all(|range| *range == default) {
        Ok(None)
    } else {
        Ok(Some(ranges))
    }
}

fn max_sample(bits: u8) -> u32 {
    (1u32 << bits) - 1
}

/// Reads sample `index` of a byte-aligned row packed at `bits` per sample, MSB first.
fn read_sample(row: &[u8], bits: u8, index: usize) -> u32 {
    match bits {
        8 => u32::from(row[index]),
        16 => u32::from(u16::from_be_bytes([row[2 * index], row[2 * index + 1]])),
        _ => {
            let bit = index * usize::from(bits);
            let shift = 8 - usize::from(bits) - bit % 8;
            u32::from(row[bit / 8] >> shift) & max_sample(bits)
        }
    }
}

/// Maps a raw sample to an 8-bit component, or to a palette index for indexed images.
fn sample_to_byte(raw: u32, bits: u8, range: Option<(f32, f32)>, indexed: bool) -> u8 {
    let max = max_sample(bits);
    match range {
        None if indexed => raw.min(255) as u8,
        None if bits == 16 => (raw >> 8) as u8,
        None => (raw * 255 / max) as u8,
        Some((lo, hi)) => {
            let value = lo + raw as f32 * (hi - lo) / max as f32;
            if indexed {
                value.round().clamp(0.0, 255.0) as u8
            } else {
                (value.clamp(0.0, 1.0) * 255.0).round() as u8
            }
        }
    }
}

/// Expands packed samples into an RGB image. Rows start on byte boundaries.
fn samples_to_rgb(
    width: u32,
    height: u32,
    space: &ColourSpace,
    bits: u8,
    decode: Option<&[(f32, f32)]>,
    samples: &[u8],
) -> AppResult<RgbImage> {
    let (w, h) = (width as usize, height as usize);
    let components = space.components();
    let row_bytes = (w * components * usize::from(bits) + 7) / 8;
    if samples.len() < row_bytes * h {
        return Err(AppError::extraction(format!(
            "Image data truncated: expected {} bytes, got {}",
            row_bytes * h,
            samples.len()
        )));
    }

    let indexed = space.is_indexed();
    let mut px = vec![0u8; components];
    let mut rgb = Vec::with_capacity(w * h * 3);
    for row in samples.chunks_exact(row_bytes).take(h) {
        for x in 0..w {
            for (c, value) in px.iter_mut().enumerate() {
                let raw = read_sample(row, bits, x * components + c);
                *value = sample_to_byte(raw, bits, decode.map(|ranges| ranges[c]), indexed);
            }
            rgb.extend_from_slice(&space.to_rgb(&px));
        }
    }

    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| AppError::extraction("Image buffer size mismatch"))
}

fn info_string(doc: &Document, key: &[u8]) -> Option<String> {
    let info = resolve(doc, doc.trailer.get(b"Info").ok()?).ok()?.as_dict().ok()?;
    let raw = resolve(doc, info.get(key).ok()?).ok()?.as_str().ok()?;
    let decoded = decode_pdf_string(raw);
    let trimmed = decoded.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Decodes a PDF text string, honouring UTF-16 byte order marks.
fn decode_pdf_string(bytes: &[u8]) -> String {
    let utf16 = |body: &[u8], big_endian: bool| {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|p| if big_endian { u16::from_be_bytes([p[0], p[1]]) } else { u16::from_le_bytes([p[0], p[1]]) })
            .collect();
        String::from_utf16_lossy(&units).replace('\0', "")
    };

    match bytes {
        [0xFE, 0xFF, rest @ ..] => utf16(rest, true),
        [0xFF, 0xFE, rest @ ..] => utf16(rest, false),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_utf16_strings_with_bom() {
        assert_eq!(decode_pdf_string(&[0xFE, 0xFF, 0x00, b'H', 0x00, b'i']), "Hi");
        assert_eq!(decode_pdf_string(&[0xFF, 0xFE, b'H', 0x00, b'i', 0x00]), "Hi");
        assert_eq!(decode_pdf_string(b"plain"), "plain");
    }

    #[test]
    fn expands_one_bit_gray_rows_with_padding() {
        // 3 pixels wide: 0b101_00000 per row
        let img = samples_to_rgb(3, 2, &ColourSpace::Gray, 1, None, &[0b1010_0000, 0b0100_0000]).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(img.get_pixel(1, 0).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(2, 0).0, [255, 255, 255]);
        assert_eq!(img.get_pixel(1, 1).0, [255, 255, 255]);
    }

    #[test]
    fn converts_cmyk_samples() {
        let img = samples_to_rgb(2, 1, &ColourSpace::Cmyk, 8, None, &[0, 0, 0, 0, 0, 0, 0, 255]).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(img.get_pixel(1, 0).0, [0, 0, 0]);
    }

    #[test]
    fn unpacks_two_and_four_bit_gray() {
        let img = samples_to_rgb(4, 1, &ColourSpace::Gray, 2, None, &[0b00_01_10_11]).unwrap();
        let values: Vec<u8> = img.pixels().map(|p| p.0[0]).collect();
        assert_eq!(values, vec![0, 85, 170, 255]);

        let img = samples_to_rgb(3, 1, &ColourSpace::Gray, 4, None, &[0x0F, 0x80]).unwrap();
        let values: Vec<u8> = img.pixels().map(|p| p.0[0]).collect();
        assert_eq!(values, vec![0, 255, 136]);
    }

    #[test]
    fn sixteen_bit_samples_keep_high_byte() {
        let img = samples_to_rgb(1, 1, &ColourSpace::Rgb, 16, None, &[0x12, 0x34, 0xAB, 0xCD, 0xFF, 0xFF]).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [0x12, 0xAB, 0xFF]);
    }

    #[test]
    fn indexed_samples_use_palette() {
        let space = ColourSpace::Indexed {
            base: Box::new(ColourSpace::Rgb),
            hival: 1,
            lookup: vec![255, 0, 0, 0, 0, 255],
        };
        let img = samples_to_rgb(3, 1, &space, 8, None, &[0, 1, 7]).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(img.get_pixel(1, 0).0, [0, 0, 255]);
        // Out-of-range indices clamp to hival
        assert_eq!(img.get_pixel(2, 0).0, [0, 0, 255]);
    }

    #[test]
    fn decode_ranges_invert_samples() {
        let img = samples_to_rgb(2, 1, &ColourSpace::Gray, 1, Some(&[(1.0, 0.0)][..]), &[0b1000_0000]).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(1, 0).0, [255, 255, 255]);
    }

    #[test]
    fn rejects_truncated_samples() {
        assert!(samples_to_rgb(4, 4, &ColourSpace::Rgb, 8, None, &[0; 10]).is_err());
    }

    #[test]
    fn rejects_unsupported_bit_depth() {
        assert!(sample_depth(3).is_err());
        assert!(sample_depth(32).is_err());
        assert_eq!(sample_depth(16).unwrap(), 16);
    }
}

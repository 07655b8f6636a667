//! Fixture PDFs built with lopdf.

#![allow(dead_code)]

use std::io::Cursor;

use docbits::services::{DocumentExtractor, ExtractedContent};
use docbits::AppResult;
use image::{ImageOutputFormat, Rgb, RgbImage};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

pub fn solid_image(width: u32, height: u32, rgb: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb(rgb))
}

/// How an image is embedded in a fixture page.
pub enum Embedded {
    /// Uncompressed DeviceRGB samples.
    Raw(RgbImage),
    /// JPEG bytes behind /DCTDecode.
    Jpeg(RgbImage),
    /// Uncompressed DeviceGray samples.
    Gray { width: u32, height: u32, samples: Vec<u8> },
    /// Arbitrary image dictionary entries over uncompressed data.
    Custom { dict: Dictionary, data: Vec<u8> },
}

#[derive(Default)]
pub struct PageSpec {
    pub text: Option<String>,
    pub images: Vec<Embedded>,
}

impl PageSpec {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            images: Vec::new(),
        }
    }

    pub fn image(image: RgbImage) -> Self {
        Self {
            text: None,
            images: vec![Embedded::Raw(image)],
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_image(mut self, image: Embedded) -> Self {
        self.images.push(image);
        self
    }
}

fn image_stream(embedded: &Embedded) -> Stream {
    match embedded {
        Embedded::Raw(img) => Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => img.width() as i64,
                "Height" => img.height() as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8i64,
            },
            img.as_raw().clone(),
        ),
        Embedded::Jpeg(img) => {
            let mut jpeg = Vec::new();
            image::DynamicImage::ImageRgb8(img.clone())
                .write_to(&mut Cursor::new(&mut jpeg), ImageOutputFormat::Jpeg(90))
                .expect("failed to encode fixture JPEG");
            Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => img.width() as i64,
                    "Height" => img.height() as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8i64,
                    "Filter" => "DCTDecode",
                },
                jpeg,
            )
        }
        Embedded::Gray { width, height, samples } => Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => *width as i64,
                "Height" => *height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8i64,
            },
            samples.clone(),
        ),
        Embedded::Custom { dict, data } => {
            let mut dict = dict.clone();
            dict.set("Type", "XObject");
            dict.set("Subtype", "Image");
            Stream::new(dict, data.clone())
        }
    }
}

/// Builds a PDF whose pages carry the given text and images, in order.
pub fn build_pdf(pages: Vec<PageSpec>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id: ObjectId = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids: Vec<Object> = Vec::new();
    for page in pages {
        let mut content = String::new();
        let mut xobjects = Dictionary::new();

        for (i, embedded) in page.images.iter().enumerate() {
            let image_id = doc.add_object(Object::Stream(image_stream(embedded)));
            let name = format!("Im{}", i);
            xobjects.set(name.as_bytes().to_vec(), image_id);
            content.push_str(&format!("q 50 0 0 50 72 {} cm /{} Do Q\n", 72 + 60 * i, name));
        }
        if let Some(text) = &page.text {
            content.push_str(&format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET\n", text));
        }

        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
                "XObject" => xobjects,
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("failed to save fixture PDF");
    buf
}

/// One page with one 50x50 image and the text "hi".
pub fn report_pdf() -> Vec<u8> {
    build_pdf(vec![PageSpec::image(solid_image(50, 50, [200, 30, 90])).with_text("hi")])
}

/// Returns fixed content regardless of input.
pub struct StaticExtractor(pub ExtractedContent);

impl DocumentExtractor for StaticExtractor {
    fn extract(&self, _document: &[u8]) -> AppResult<ExtractedContent> {
        Ok(self.0.clone())
    }
}

/// Sleeps before returning empty content.
pub struct SlowExtractor(pub std::time::Duration);

impl DocumentExtractor for SlowExtractor {
    fn extract(&self, _document: &[u8]) -> AppResult<ExtractedContent> {
        std::thread::sleep(self.0);
        Ok(ExtractedContent::default())
    }
}

pub fn content(images: Vec<RgbImage>, texts: &[&str]) -> ExtractedContent {
    ExtractedContent {
        images,
        texts: texts.iter().map(|t| t.to_string()).collect(),
        ..Default::default()
    }
}

//! PDF adapter: feeds the layout reconstructor with positioned words, ruling
//! lines and image anchors (via pdfium), and pulls embedded image bytes out of
//! the object model (via lopdf).
//!
//! pdfium reports coordinates bottom-up; everything is converted to top-down
//! "distance from page top" units before it reaches the layout code.

use pdfium_render::prelude::*;

use crate::error::{Error, Result};
use crate::ingestion::format::FormatSniffer;
use crate::types::{Document, ExtractedImage};

use super::layout::{self, BBox, ImageAnchor, PageWord};

/// Horizontal gap that ends a word during character grouping
const WORD_X_GAP: f32 = 3.0;
/// Vertical drift tolerated within one word
const WORD_Y_DRIFT: f32 = 2.0;

/// Rebuilds reading order from unordered PDF primitives, one document per page
pub struct PdfLayoutReconstructor {
    /// Vertical gap between lines that still belongs to the same block
    line_gap: f32,
}

impl PdfLayoutReconstructor {
    pub fn new(line_gap: f32) -> Self {
        Self { line_gap }
    }

    /// Extract one `Document` per page, in reading order, with image
    /// placeholders interleaved at their anchor positions.
    pub fn extract_documents(&self, data: &[u8], source_name: &str) -> Result<Vec<Document>> {
        let pdfium = Pdfium::new(
            Pdfium::bind_to_system_library()
                .map_err(|e| Error::internal(format!("pdfium library unavailable: {:?}", e)))?,
        );
        let document = pdfium
            .load_pdf_from_byte_slice(data, None)
            .map_err(|e| Error::corrupt_container(source_name, format!("{:?}", e)))?;

        let mut documents = Vec::new();
        for (index, page) in document.pages().iter().enumerate() {
            let page_height = page.height().value;
            let words = collect_words(&page, page_height);
            let (rulings, anchors) = collect_objects(&page, page_height);

            let text = layout::compose_page(
                index as u32 + 1,
                &words,
                &rulings,
                &anchors,
                self.line_gap,
            );
            documents.push(Document::for_page(text, source_name, index as u32));
        }

        tracing::debug!(
            "[{}] reconstructed {} pages",
            source_name,
            documents.len()
        );
        Ok(documents)
    }
}

/// Group page characters into words with union bounding boxes.
///
/// A word ends on whitespace, a horizontal gap, or a baseline change.
fn collect_words(page: &PdfPage, page_height: f32) -> Vec<PageWord> {
    let Ok(text_page) = page.text() else {
        return Vec::new();
    };

    let mut words: Vec<PageWord> = Vec::new();
    let mut current: Option<PageWord> = None;

    for character in text_page.chars().iter() {
        let Some(c) = character.unicode_char() else {
            continue;
        };
        if c.is_whitespace() {
            if let Some(word) = current.take() {
                words.push(word);
            }
            continue;
        }
        let Ok(rect) = character.loose_bounds() else {
            continue;
        };
        let bbox = BBox::new(
            rect.left.value,
            page_height - rect.top.value,
            rect.right.value,
            page_height - rect.bottom.value,
        );

        let breaks_word = current.as_ref().is_some_and(|word| {
            bbox.x0 - word.bbox.x1 > WORD_X_GAP || (bbox.top - word.bbox.top).abs() > WORD_Y_DRIFT
        });
        if breaks_word {
            if let Some(word) = current.take() {
                words.push(word);
            }
        }

        match current.as_mut() {
            Some(word) => {
                word.text.push(c);
                word.bbox = BBox::new(
                    word.bbox.x0.min(bbox.x0),
                    word.bbox.top.min(bbox.top),
                    word.bbox.x1.max(bbox.x1),
                    word.bbox.bottom.max(bbox.bottom),
                );
            }
            None => {
                current = Some(PageWord {
                    text: c.to_string(),
                    bbox,
                });
            }
        }
    }
    if let Some(word) = current.take() {
        words.push(word);
    }

    words
}

/// Collect path-object bounds (ruling candidates) and image anchors
fn collect_objects(page: &PdfPage, page_height: f32) -> (Vec<BBox>, Vec<ImageAnchor>) {
    let mut rulings = Vec::new();
    let mut anchors = Vec::new();
    let mut image_index = 0u32;

    for object in page.objects().iter() {
        let Ok(bounds) = object.bounds() else {
            continue;
        };
        let top = page_height - bounds.top().value;
        match object.object_type() {
            PdfPageObjectType::Path => {
                rulings.push(BBox::new(
                    bounds.left().value,
                    top,
                    bounds.right().value,
                    page_height - bounds.bottom().value,
                ));
            }
            PdfPageObjectType::Image => {
                anchors.push(ImageAnchor {
                    top,
                    image_index,
                });
                image_index += 1;
            }
            _ => {}
        }
    }

    (rulings, anchors)
}

/// Pull embedded images out of a PDF's page resources.
///
/// IDs are derived from `(file_id, page, index)` so re-running over the same
/// bytes always yields the same ids. Per-image failures are logged and
/// skipped; only an unloadable document is fatal.
pub fn extract_pdf_images(
    data: &[u8],
    file_id: &str,
    source_name: &str,
) -> Result<Vec<ExtractedImage>> {
    let doc = lopdf::Document::load_mem(data)
        .map_err(|e| Error::corrupt_container(source_name, e.to_string()))?;

    let mut images = Vec::new();
    for (page_number, page_id) in doc.get_pages() {
        let Ok(page_dict) = doc.get_dictionary(page_id) else {
            continue;
        };
        let Some(resources) = page_dict
            .get(b"Resources")
            .ok()
            .and_then(|obj| resolve_dict(&doc, obj))
        else {
            continue;
        };
        let Some(xobjects) = resources
            .get(b"XObject")
            .ok()
            .and_then(|obj| resolve_dict(&doc, obj))
        else {
            continue;
        };

        let mut image_index = 0u32;
        for (name, obj) in xobjects.iter() {
            let Some(stream) = resolve_stream(&doc, obj) else {
                continue;
            };
            let is_image = stream
                .dict
                .get(b"Subtype")
                .ok()
                .and_then(|s| s.as_name().ok())
                .map(|s| s == b"Image")
                .unwrap_or(false);
            if !is_image {
                continue;
            }
            if stream.content.is_empty() {
                tracing::debug!(
                    "[{}] empty image stream {} on page {}",
                    source_name,
                    String::from_utf8_lossy(name),
                    page_number
                );
                continue;
            }

            images.push(ExtractedImage {
                image_id: format!("{}_page{}_img{}", file_id, page_number, image_index),
                page_number: Some(page_number),
                image_index: Some(image_index),
                format: image_format(stream),
                bytes: stream.content.clone(),
            });
            image_index += 1;
        }
    }

    tracing::info!("[{}] extracted {} embedded images", source_name, images.len());
    Ok(images)
}

fn resolve<'a>(doc: &'a lopdf::Document, mut obj: &'a lopdf::Object) -> &'a lopdf::Object {
    // References can chain; a few hops is plenty for real documents
    for _ in 0..4 {
        match obj {
            lopdf::Object::Reference(id) => match doc.get_object(*id) {
                Ok(inner) => obj = inner,
                Err(_) => break,
            },
            _ => break,
        }
    }
    obj
}

fn resolve_dict<'a>(
    doc: &'a lopdf::Document,
    obj: &'a lopdf::Object,
) -> Option<&'a lopdf::Dictionary> {
    resolve(doc, obj).as_dict().ok()
}

fn resolve_stream<'a>(
    doc: &'a lopdf::Document,
    obj: &'a lopdf::Object,
) -> Option<&'a lopdf::Stream> {
    resolve(doc, obj).as_stream().ok()
}

/// Decide a stored format: magic bytes first, then the stream filter
fn image_format(stream: &lopdf::Stream) -> String {
    if let Some(format) = FormatSniffer::sniff_image_format(&stream.content) {
        return format.to_string();
    }
    let filter_name = |name: &[u8]| match name {
        b"DCTDecode" => Some("jpg"),
        b"JPXDecode" => Some("jp2"),
        _ => None,
    };
    let from_filter = match stream.dict.get(b"Filter") {
        Ok(lopdf::Object::Name(name)) => filter_name(name),
        Ok(lopdf::Object::Array(filters)) => filters.iter().find_map(|f| {
            f.as_name().ok().and_then(filter_name)
        }),
        _ => None,
    };
    from_filter.unwrap_or("png").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Object, Stream};

    /// Minimal one-page PDF carrying a single JPEG XObject
    fn build_pdf_with_image(jpeg_bytes: &[u8]) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");

        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg_bytes.to_vec(),
        );
        let image_id = doc.add_object(image);

        let pages_id = doc.new_object_id();
        let resources_id = doc.add_object(dictionary! {
            "XObject" => dictionary! { "Im0" => Object::Reference(image_id) },
        });
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "Resources" => Object::Reference(resources_id),
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_image_ids_are_deterministic() {
        let jpeg = [0xFFu8, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];
        let pdf = build_pdf_with_image(&jpeg);

        let first = extract_pdf_images(&pdf, "file-a", "doc.pdf").unwrap();
        let second = extract_pdf_images(&pdf, "file-a", "doc.pdf").unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].image_id, "file-a_page1_img0");
        assert_eq!(first[0].page_number, Some(1));
        assert_eq!(first[0].image_index, Some(0));
        assert_eq!(first[0].format, "jpg");
        assert_eq!(first[0].bytes, jpeg);
        assert_eq!(first[0].image_id, second[0].image_id);
    }

    #[test]
    fn test_unloadable_pdf_is_corrupt() {
        let err = extract_pdf_images(b"%PDF-1.5 then garbage", "f", "bad.pdf").unwrap_err();
        assert!(matches!(err, Error::CorruptContainer { .. }));
    }

    #[test]
    fn test_format_from_filter_when_magic_unknown() {
        let stream = Stream::new(
            dictionary! { "Subtype" => "Image", "Filter" => "JPXDecode" },
            vec![0x00, 0x01, 0x02],
        );
        assert_eq!(image_format(&stream), "jp2");

        let raw = Stream::new(dictionary! { "Subtype" => "Image" }, vec![0x00]);
        assert_eq!(image_format(&raw), "png");
    }
}

//! Embedded image extraction across formats.
//!
//! PDF images come out of the object model page by page; DOCX and PPTX images
//! are media entries in the OOXML zip. IDs follow the original naming scheme
//! and are fully determined by `(file_id, page, index)`.

use std::io::{Cursor, Read};

use crate::error::{Error, Result};
use crate::types::{ExtractedImage, FormatKind};

use super::format::FormatSniffer;
use super::pdf;

/// Extract embedded images from a file; formats without image support return
/// an empty list rather than an error.
pub fn extract_images(data: &[u8], filename: &str, file_id: &str) -> Result<Vec<ExtractedImage>> {
    match FormatSniffer::sniff(filename) {
        FormatKind::Pdf => pdf::extract_pdf_images(data, file_id, filename),
        FormatKind::Docx => extract_zip_media(data, filename, file_id, "word/media/", "img"),
        FormatKind::Pptx => extract_zip_media(data, filename, file_id, "ppt/media/", "slide_img"),
        _ => {
            tracing::debug!("[{}] format has no image extraction path", filename);
            Ok(Vec::new())
        }
    }
}

/// Pull media entries out of an OOXML archive under `media_prefix`.
///
/// Indices are 1-based in the id (`{file_id}_img{n}` / `{file_id}_slide_img{n}`)
/// and there is no page binding; only PDF anchors carry positions.
fn extract_zip_media(
    data: &[u8],
    filename: &str,
    file_id: &str,
    media_prefix: &str,
    id_stem: &str,
) -> Result<Vec<ExtractedImage>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|e| Error::corrupt_container(filename, e.to_string()))?;

    let mut media_names: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with(media_prefix))
        .map(str::to_string)
        .collect();
    media_names.sort();

    let mut images = Vec::new();
    for (index, name) in media_names.iter().enumerate() {
        let mut bytes = Vec::new();
        match archive.by_name(name) {
            Ok(mut entry) => {
                if entry.read_to_end(&mut bytes).is_err() {
                    tracing::warn!("[{}] media entry {} unreadable, skipping", filename, name);
                    continue;
                }
            }
            Err(e) => {
                tracing::warn!("[{}] media entry {} missing: {}", filename, name, e);
                continue;
            }
        }

        let format = name
            .rsplit('.')
            .next()
            .filter(|ext| !ext.contains('/'))
            .map(|ext| ext.to_lowercase())
            .or_else(|| FormatSniffer::sniff_image_format(&bytes).map(str::to_string))
            .unwrap_or_else(|| "png".to_string());

        let ordinal = index as u32 + 1;
        images.push(ExtractedImage {
            image_id: format!("{}_{}{}", file_id, id_stem, ordinal),
            page_number: None,
            image_index: Some(ordinal),
            format,
            bytes,
        });
    }

    tracing::info!("[{}] extracted {} media images", filename, images.len());
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_docx_media_extraction() {
        let jpeg = [0xFFu8, 0xD8, 0xFF, 0xE0, 1, 2, 3];
        let data = build_zip(&[
            ("word/document.xml", b"<w:document/>"),
            ("word/media/image1.jpeg", &jpeg),
            ("word/media/image2.png", &PNG_MAGIC),
        ]);

        let images = extract_images(&data, "doc.docx", "fid").unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].image_id, "fid_img1");
        assert_eq!(images[0].format, "jpeg");
        assert_eq!(images[0].bytes, jpeg);
        assert_eq!(images[1].image_id, "fid_img2");
        assert_eq!(images[1].page_number, None);
    }

    #[test]
    fn test_pptx_media_ids_and_magic_fallback() {
        let data = build_zip(&[
            ("ppt/slides/slide1.xml", b"<p:sld/>"),
            ("ppt/media/picture", &PNG_MAGIC), // no extension: magic sniff
        ]);

        let images = extract_images(&data, "deck.pptx", "fid").unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].image_id, "fid_slide_img1");
        assert_eq!(images[0].format, "png");
    }

    #[test]
    fn test_formats_without_images_return_empty() {
        assert!(extract_images(b"plain", "notes.txt", "fid").unwrap().is_empty());
        assert!(extract_images(b"data", "sheet.xlsx", "fid").unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_docx_zip_is_error() {
        assert!(extract_images(b"not a zip", "doc.docx", "fid").is_err());
    }
}

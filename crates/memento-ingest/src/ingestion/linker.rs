//! Binds extracted images to the chunks containing their placeholder tokens.
//!
//! Each token is consumed exactly once: replaced with the image's caption when
//! one exists, removed outright when captioning failed or the image is
//! missing. A chunk without tokens passes through untouched, so captions never
//! leak into chunks the image does not visually belong to.

use std::collections::HashMap;

use crate::types::image::PLACEHOLDER_RE;
use crate::types::{Chunk, ExtractedImage, PlaceholderToken};

/// Replaces placeholder tokens with per-image captions
pub struct ImagePlaceholderLinker;

impl ImagePlaceholderLinker {
    /// Substitute every placeholder in `chunks`, recording consumed image ids
    /// on each chunk. `captions` maps `image_id` to caption text; empty or
    /// missing captions degrade to removing the token.
    pub fn link_images(
        chunks: &mut [Chunk],
        extracted_images: &[ExtractedImage],
        captions: &HashMap<String, String>,
    ) {
        // (page, index) -> image_id, from the extraction pass
        let by_position: HashMap<(u32, u32), &str> = extracted_images
            .iter()
            .filter_map(|image| {
                let page = image.page_number?;
                let index = image.image_index?;
                Some(((page, index), image.image_id.as_str()))
            })
            .collect();

        for chunk in chunks.iter_mut() {
            if !chunk.text.contains("__IMAGE_PLACEHOLDER_") {
                continue;
            }

            let mut linked_ids: Vec<String> = Vec::new();
            let replaced = PLACEHOLDER_RE.replace_all(&chunk.text, |caps: &regex::Captures| {
                let token = match PlaceholderToken::parse(&caps[0]) {
                    Some(token) => token,
                    None => return String::new(),
                };
                let Some(image_id) = by_position.get(&(token.page_number, token.image_index))
                else {
                    tracing::debug!(
                        "no extracted image for placeholder p{} i{}",
                        token.page_number,
                        token.image_index
                    );
                    return String::new();
                };

                match captions.get(*image_id).filter(|c| !c.trim().is_empty()) {
                    Some(caption) => {
                        if !linked_ids.iter().any(|id| id == image_id) {
                            linked_ids.push((*image_id).to_string());
                        }
                        format!(
                            "[이미지: {}페이지 이미지{}]\n{}",
                            token.page_number,
                            token.image_index + 1,
                            caption
                        )
                    }
                    None => String::new(),
                }
            });

            chunk.text = replaced.into_owned();
            chunk.content_length = chunk.text.chars().count();
            chunk.extracted_images = linked_ids;
        }
    }
}

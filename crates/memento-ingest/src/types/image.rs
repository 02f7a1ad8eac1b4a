//! Extracted images and the in-text placeholder tokens that locate them

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Matches `__IMAGE_PLACEHOLDER_p{page}_i{index}__` anywhere in chunk text
pub(crate) static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__IMAGE_PLACEHOLDER_p(\d+)_i(\d+)__").unwrap());

/// An opaque in-text marker standing in for an image's position on a PDF page.
///
/// Created during layout reconstruction, substituted exactly once by the
/// placeholder linker, never persisted past that stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaceholderToken {
    /// Page number, 1-based (matches extracted image metadata)
    pub page_number: u32,
    /// Image index on the page, 0-based
    pub image_index: u32,
}

impl PlaceholderToken {
    pub fn new(page_number: u32, image_index: u32) -> Self {
        Self {
            page_number,
            image_index,
        }
    }

    /// Render the opaque marker string embedded in page text
    pub fn render(&self) -> String {
        format!(
            "__IMAGE_PLACEHOLDER_p{}_i{}__",
            self.page_number, self.image_index
        )
    }

    /// Parse a marker string back into a token
    pub fn parse(marker: &str) -> Option<Self> {
        let caps = PLACEHOLDER_RE.captures(marker)?;
        Some(Self {
            page_number: caps.get(1)?.as_str().parse().ok()?,
            image_index: caps.get(2)?.as_str().parse().ok()?,
        })
    }
}

/// An image pulled out of a document, ready for upload and captioning.
///
/// `image_id` is derived deterministically from `(file_id, page, index)` so the
/// same input bytes always produce the same id across re-runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedImage {
    /// Deterministic image identifier
    pub image_id: String,
    /// Page number (1-based, PDF only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    /// Image index within its page (PDF, 0-based) or file (DOCX/PPTX, 1-based)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_index: Option<u32>,
    /// Image format, e.g. "jpg", "png"
    pub format: String,
    /// Raw image bytes
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl ExtractedImage {
    /// Storage filename for this image
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.image_id, self.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let token = PlaceholderToken::new(3, 0);
        let rendered = token.render();
        assert_eq!(rendered, "__IMAGE_PLACEHOLDER_p3_i0__");
        assert_eq!(PlaceholderToken::parse(&rendered), Some(token));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(PlaceholderToken::parse("__IMAGE_PLACEHOLDER_px_i0__"), None);
        assert_eq!(PlaceholderToken::parse("not a token"), None);
    }
}

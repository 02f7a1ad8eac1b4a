//! Format sniffing: extension-first, magic bytes as a fallback for media entries

use crate::types::FormatKind;

/// Resolves which parser handles a file.
///
/// Dispatch happens exactly once per file; parsers never re-inspect the
/// extension themselves.
pub struct FormatSniffer;

impl FormatSniffer {
    /// Sniff the format from the filename
    pub fn sniff(filename: &str) -> FormatKind {
        FormatKind::from_filename(filename)
    }

    /// Detect an image format from its magic prefix.
    ///
    /// Fallback for zip media entries that carry no extension; returns the
    /// canonical short extension.
    pub fn sniff_image_format(data: &[u8]) -> Option<&'static str> {
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some("jpg")
        } else if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some("png")
        } else if data.starts_with(b"GIF8") {
            Some("gif")
        } else {
            None
        }
    }
}

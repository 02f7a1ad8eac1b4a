//! HWPX (zip + namespaced XML) text extraction and password detection.
//!
//! Producers vary the namespace prefix, so element matching goes by local
//! name only: paragraphs are elements whose tag ends in `p`, text runs end in
//! `t`. Section files live under `Contents/section*.xml` and sort
//! lexicographically into document order.

use std::io::{Cursor, Read};

use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use crate::error::{Error, Result};

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Parses HWPX archives into section text
pub struct HwpxZipExtractor;

impl HwpxZipExtractor {
    /// Extract all section text, sections joined with a blank line.
    ///
    /// Falls back to regex tag-stripping of the first `contents` entry when no
    /// `Contents/section*.xml` files exist (degraded but non-fatal).
    pub fn extract_text(data: &[u8], filename: &str) -> Result<String> {
        if Self::is_password_protected(data) {
            return Err(Error::PasswordProtected(filename.to_string()));
        }

        let mut archive = zip::ZipArchive::new(Cursor::new(data))
            .map_err(|e| Error::corrupt_container(filename, e.to_string()))?;

        let mut section_names: Vec<String> = archive
            .file_names()
            .filter(|name| name.starts_with("Contents/section") && name.ends_with(".xml"))
            .map(str::to_string)
            .collect();
        section_names.sort();

        if section_names.is_empty() {
            tracing::warn!("[{}] no section XML found, using tag-strip fallback", filename);
            return Self::extract_fallback(&mut archive, filename);
        }

        let mut sections = Vec::new();
        for name in &section_names {
            let mut xml = String::new();
            match archive.by_name(name) {
                Ok(mut entry) => {
                    if entry.read_to_string(&mut xml).is_err() {
                        tracing::warn!("[{}] section {} unreadable, skipping", filename, name);
                        continue;
                    }
                }
                Err(e) => {
                    tracing::warn!("[{}] section {} missing: {}", filename, name, e);
                    continue;
                }
            }
            let lines = extract_paragraph_lines(&xml);
            if !lines.is_empty() {
                sections.push(lines.join("\n"));
            }
        }

        Ok(sections.join("\n\n"))
    }

    /// Check `META-INF/manifest.xml` for an `encryption-data` element.
    ///
    /// Fails open: an unreadable archive or malformed manifest counts as not
    /// protected so valid files are never blocked by a probe failure.
    pub fn is_password_protected(data: &[u8]) -> bool {
        let Ok(mut archive) = zip::ZipArchive::new(Cursor::new(data)) else {
            return false;
        };
        let Ok(mut entry) = archive.by_name("META-INF/manifest.xml") else {
            return false;
        };
        let mut manifest = String::new();
        if entry.read_to_string(&mut manifest).is_err() {
            return false;
        }

        let mut reader = Reader::from_str(&manifest);
        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                    let name = e.local_name();
                    if String::from_utf8_lossy(name.as_ref()).contains("encryption-data") {
                        return true;
                    }
                }
                Ok(Event::Eof) => return false,
                Err(_) => return false,
                _ => {}
            }
        }
    }

    /// Last-resort extraction: strip tags from the first contents XML entry
    fn extract_fallback(
        archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
        filename: &str,
    ) -> Result<String> {
        let fallback_name = archive
            .file_names()
            .find(|name| name.to_lowercase().contains("contents") && name.ends_with(".xml"))
            .map(str::to_string)
            .ok_or_else(|| {
                Error::corrupt_container(filename, "no section or contents XML in archive")
            })?;

        let mut raw = String::new();
        archive
            .by_name(&fallback_name)
            .map_err(|e| Error::corrupt_container(filename, e.to_string()))?
            .read_to_string(&mut raw)
            .map_err(|e| Error::corrupt_container(filename, e.to_string()))?;

        let stripped = TAG_RE.replace_all(&raw, " ");
        let collapsed = WHITESPACE_RE.replace_all(&stripped, " ");
        Ok(collapsed.trim().to_string())
    }
}

/// Collect paragraph lines from one section XML document.
///
/// A paragraph is any element with local name `p`; its text is the
/// concatenation of every descendant `t` run. Whitespace-only paragraphs are
/// dropped.
fn extract_paragraph_lines(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);

    let mut lines = Vec::new();
    let mut paragraph_depth = 0u32;
    let mut text_depth = 0u32;
    let mut line = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => {
                    paragraph_depth += 1;
                    if paragraph_depth == 1 {
                        line.clear();
                    }
                }
                b"t" if paragraph_depth > 0 => text_depth += 1,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if text_depth > 0 {
                    if let Ok(text) = e.unescape() {
                        line.push_str(&text);
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"p" => {
                    if paragraph_depth > 0 {
                        paragraph_depth -= 1;
                        if paragraph_depth == 0 && !line.trim().is_empty() {
                            lines.push(std::mem::take(&mut line));
                        }
                    }
                }
                b"t" => text_depth = text_depth.saturating_sub(1),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    const SECTION0: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<hs:sec xmlns:hs="http://www.hancom.co.kr/hwpml/2011/section" xmlns:hp="http://www.hancom.co.kr/hwpml/2011/paragraph">
  <hp:p><hp:run><hp:t>첫 문단</hp:t></hp:run></hp:p>
  <hp:p><hp:run><hp:t>둘째 </hp:t><hp:t>문단</hp:t></hp:run></hp:p>
  <hp:p><hp:run><hp:t>   </hp:t></hp:run></hp:p>
</hs:sec>"#;

    const SECTION1: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:sec xmlns:w="urn:other-prefix">
  <w:p><w:r><w:t>section two line one</w:t></w:r></w:p>
  <w:p><w:r><w:t>section two line two</w:t></w:r></w:p>
</w:sec>"#;

    #[test]
    fn test_two_sections_two_paragraphs_each() {
        let data = build_zip(&[
            ("Contents/section0.xml", SECTION0),
            ("Contents/section1.xml", SECTION1),
            ("Contents/header.xml", "<h/>"),
        ]);

        let text = HwpxZipExtractor::extract_text(&data, "fixture.hwpx").unwrap();
        let blocks: Vec<&str> = text.split("\n\n").collect();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], "첫 문단\n둘째 문단");
        assert_eq!(blocks[1], "section two line one\nsection two line two");
    }

    #[test]
    fn test_namespace_prefix_is_ignored() {
        let data = build_zip(&[("Contents/section0.xml", SECTION1)]);
        let text = HwpxZipExtractor::extract_text(&data, "any-prefix.hwpx").unwrap();
        assert_eq!(text, "section two line one\nsection two line two");
    }

    #[test]
    fn test_fallback_tag_strip() {
        let data = build_zip(&[(
            "contents.xml",
            "<doc><body>fallback   text</body>\n<tail>here</tail></doc>",
        )]);
        let text = HwpxZipExtractor::extract_text(&data, "odd.hwpx").unwrap();
        assert_eq!(text, "fallback text here");
    }

    #[test]
    fn test_not_a_zip_is_corrupt() {
        let err = HwpxZipExtractor::extract_text(b"not a zip at all", "bad.hwpx").unwrap_err();
        assert!(matches!(err, Error::CorruptContainer { .. }));
    }

    #[test]
    fn test_encryption_manifest_detected() {
        let manifest = r#"<?xml version="1.0"?>
<odf:manifest xmlns:odf="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0">
  <odf:file-entry odf:full-path="Contents/section0.xml">
    <odf:encryption-data><odf:algorithm/></odf:encryption-data>
  </odf:file-entry>
</odf:manifest>"#;
        let protected = build_zip(&[
            ("META-INF/manifest.xml", manifest),
            ("Contents/section0.xml", SECTION0),
        ]);
        assert!(HwpxZipExtractor::is_password_protected(&protected));

        let err = HwpxZipExtractor::extract_text(&protected, "locked.hwpx").unwrap_err();
        assert!(matches!(err, Error::PasswordProtected(_)));
    }

    #[test]
    fn test_plain_manifest_not_protected() {
        let manifest = r#"<odf:manifest xmlns:odf="urn:x"><odf:file-entry odf:full-path="x"/></odf:manifest>"#;
        let data = build_zip(&[
            ("META-INF/manifest.xml", manifest),
            ("Contents/section0.xml", SECTION0),
        ]);
        assert!(!HwpxZipExtractor::is_password_protected(&data));
    }

    #[test]
    fn test_probe_fails_open_on_garbage() {
        assert!(!HwpxZipExtractor::is_password_protected(b"garbage"));
        let bad_manifest = build_zip(&[("META-INF/manifest.xml", "<unclosed")]);
        assert!(!HwpxZipExtractor::is_password_protected(&bad_manifest));
    }
}

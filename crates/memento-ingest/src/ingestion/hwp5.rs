//! HWP 5.0 (OLE container) text extraction and password detection.
//!
//! Body sections are discovered by probing `BodyText/Section{N}` sequentially;
//! the container stores no explicit section count. Section payloads may be
//! zlib-compressed with or without a header depending on the producer, so
//! decompression runs through an ordered strategy chain.

use std::io::Read;

use crate::error::{Error, Result};

use super::compound::CompoundFile;

const FILE_HEADER_STREAM: &str = "FileHeader";
/// Record tag carrying visible paragraph text
const PARA_TEXT_TAG: u32 = 67;
/// Encryption flag: bit 1 of the FileHeader properties field
const PROP_ENCRYPTED: u32 = 0x02;
/// Byte offset of the little-endian u32 properties field inside FileHeader
const PROP_OFFSET: usize = 36;

/// Parses HWP 5.0 body sections into paragraph text
pub struct Hwp5RecordParser;

impl Hwp5RecordParser {
    /// Extract all visible text from an HWP 5.0 file.
    ///
    /// Password-protected files short-circuit with `PasswordProtected`; a
    /// container that cannot be opened is `CorruptContainer`. Individual
    /// malformed records inside a section are skipped, never fatal.
    pub fn extract_text(data: &[u8], filename: &str) -> Result<String> {
        let container = CompoundFile::open(data, filename)?;

        if Self::is_password_protected(&container) {
            return Err(Error::PasswordProtected(filename.to_string()));
        }

        let mut text = String::new();
        let mut section_index = 0u32;
        loop {
            let stream_name = format!("BodyText/Section{}", section_index);
            if !container.has_stream(&stream_name) {
                break;
            }
            match container.stream(&stream_name) {
                Some(raw) => {
                    let section = decompress_section(&raw);
                    text.push_str(&parse_section_text(&section));
                }
                None => {
                    tracing::warn!("[{}] section stream {} unreadable, skipping", filename, stream_name);
                }
            }
            section_index += 1;
        }

        tracing::debug!(
            "[{}] extracted {} chars from {} body sections",
            filename,
            text.len(),
            section_index
        );
        Ok(text.trim().to_string())
    }

    /// Check the FileHeader encryption bit without decoding any content.
    ///
    /// A missing or short header is treated as not encrypted: a malformed
    /// header must never block indexing, and the body parse will surface any
    /// real damage.
    pub fn is_password_protected(container: &CompoundFile) -> bool {
        match container.stream(FILE_HEADER_STREAM) {
            Some(header) => {
                let head = &header[..header.len().min(256)];
                is_encrypted_header(head)
            }
            None => false,
        }
    }
}

/// Inspect the first bytes of a FileHeader stream for the encryption flag
pub(crate) fn is_encrypted_header(header: &[u8]) -> bool {
    if header.len() < PROP_OFFSET + 4 {
        return false;
    }
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&header[PROP_OFFSET..PROP_OFFSET + 4]);
    let properties = u32::from_le_bytes(buf);
    properties & PROP_ENCRYPTED != 0
}

/// Decompress a body section, trying strategies in order until one succeeds:
/// zlib with header, raw deflate, then the bytes as-is. Producers differ in
/// whether they emit the zlib header, and some sections are stored plain.
pub(crate) fn decompress_section(data: &[u8]) -> Vec<u8> {
    let strategies: [fn(&[u8]) -> std::io::Result<Vec<u8>>; 2] = [inflate_zlib, inflate_raw];
    for inflate in strategies {
        if let Ok(out) = inflate(data) {
            return out;
        }
    }
    data.to_vec()
}

fn inflate_zlib(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    flate2::read::ZlibDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

fn inflate_raw(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    flate2::read::DeflateDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

/// Walk the record stream of a decompressed section, collecting PARA_TEXT
/// payloads.
///
/// Record header: 4-byte little-endian word, tag id in the low 10 bits, size
/// in bits 20-31. A zero or overrunning size skips that record's header only;
/// one corrupt record must not lose the rest of the section.
pub(crate) fn parse_section_text(data: &[u8]) -> String {
    let mut text = String::new();
    let mut offset = 0usize;

    while offset + 4 <= data.len() {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&data[offset..offset + 4]);
        let header = u32::from_le_bytes(buf);

        let tag_id = header & 0x3FF;
        let size = ((header >> 20) & 0xFFF) as usize;
        offset += 4;

        if size == 0 || offset + size > data.len() {
            continue;
        }

        if tag_id == PARA_TEXT_TAG {
            decode_para_text(&data[offset..offset + size], &mut text);
        }
        offset += size;
    }

    text
}

/// Decode a PARA_TEXT payload: UTF-16LE code units, two bytes at a time.
///
/// Control codes map to structure (10/13 newline, 9 tab, rest dropped);
/// printable units are kept only inside the script ranges HWP producers emit
/// for text content.
fn decode_para_text(record: &[u8], out: &mut String) {
    for pair in record.chunks_exact(2) {
        let code = u16::from_le_bytes([pair[0], pair[1]]);
        if code < 32 {
            match code {
                10 | 13 => out.push('\n'),
                9 => out.push('\t'),
                _ => {}
            }
        } else if is_visible_char(code) {
            if let Some(c) = char::from_u32(u32::from(code)) {
                out.push(c);
            }
        }
    }
}

/// Code unit ranges that carry real text in HWP paragraph records
fn is_visible_char(code: u16) -> bool {
    matches!(code,
        0x0020..=0x007E   // basic Latin
        | 0xAC00..=0xD7AF // Hangul syllables
        | 0x3130..=0x318F // Hangul compatibility jamo
        | 0xFF00..=0xFFEF // full-width forms
        | 0x2000..=0x206F // general punctuation
    )
}

#[cfg(test)]
mod tests {
    use super::super::compound::fixtures::build_hwp_container;
    use super::*;

    /// Record header word: tag in low 10 bits, size in bits 20-31
    fn record_header(tag: u32, size: u32) -> [u8; 4] {
        ((tag & 0x3FF) | (size << 20)).to_le_bytes()
    }

    fn para_text_record(text: &str) -> Vec<u8> {
        let payload: Vec<u8> = text
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect();
        let mut record = record_header(PARA_TEXT_TAG, payload.len() as u32).to_vec();
        record.extend_from_slice(&payload);
        record
    }

    fn file_header(properties: u32) -> Vec<u8> {
        let mut header = vec![0u8; 256];
        header[..17].copy_from_slice(b"HWP Document File");
        header[36..40].copy_from_slice(&properties.to_le_bytes());
        header
    }

    /// Real producers compress body sections with zlib
    fn zlib_compressed(data: &[u8]) -> Vec<u8> {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_password_bit_detection() {
        assert!(is_encrypted_header(&file_header(0x0000_0002)));
        assert!(!is_encrypted_header(&file_header(0x0000_0000)));
        // Other property bits alone do not mean encrypted
        assert!(!is_encrypted_header(&file_header(0x0000_0001)));
        assert!(is_encrypted_header(&file_header(0x0000_0003)));
    }

    #[test]
    fn test_short_header_is_not_encrypted() {
        assert!(!is_encrypted_header(&[0u8; 39]));
        assert!(!is_encrypted_header(&[]));
    }

    #[test]
    fn test_para_text_decoding_filters_ranges() {
        // Hangul, Latin, tab all pass; a Cyrillic unit is outside every
        // accepted range and is silently dropped
        let payload: Vec<u16> = "한글 text\tok".encode_utf16().chain([0x0410]).collect();
        let bytes: Vec<u8> = payload.iter().flat_map(|u| u.to_le_bytes()).collect();
        let mut section = record_header(PARA_TEXT_TAG, bytes.len() as u32).to_vec();
        section.extend_from_slice(&bytes);

        assert_eq!(parse_section_text(&section), "한글 text\tok");
    }

    #[test]
    fn test_control_codes_map_to_structure() {
        let payload: Vec<u16> = vec![0x0041, 13, 0x0042, 9, 0x0043, 1, 0x0044];
        let bytes: Vec<u8> = payload.iter().flat_map(|u| u.to_le_bytes()).collect();
        let mut section = record_header(PARA_TEXT_TAG, bytes.len() as u32).to_vec();
        section.extend_from_slice(&bytes);

        assert_eq!(parse_section_text(&section), "A\nB\tCD");
    }

    #[test]
    fn test_oversized_record_does_not_lose_earlier_records() {
        let mut section = para_text_record("before corruption");
        // Declared size far beyond the remaining buffer
        section.extend_from_slice(&record_header(PARA_TEXT_TAG, 0xFFF));
        section.extend_from_slice(&[0x41, 0x00]);

        let text = parse_section_text(&section);
        assert!(text.starts_with("before corruption"));
    }

    #[test]
    fn test_non_text_records_are_skipped() {
        let mut section = Vec::new();
        // A non-PARA_TEXT record with junk payload
        section.extend_from_slice(&record_header(16, 4));
        section.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        section.extend_from_slice(&para_text_record("kept"));

        assert_eq!(parse_section_text(&section), "kept");
    }

    #[test]
    fn test_decompress_strategy_chain() {
        use flate2::write::{DeflateEncoder, ZlibEncoder};
        use flate2::Compression;
        use std::io::Write;

        let plain = b"record bytes".to_vec();

        let mut zlib = ZlibEncoder::new(Vec::new(), Compression::default());
        zlib.write_all(&plain).unwrap();
        assert_eq!(decompress_section(&zlib.finish().unwrap()), plain);

        let mut raw = DeflateEncoder::new(Vec::new(), Compression::default());
        raw.write_all(&plain).unwrap();
        assert_eq!(decompress_section(&raw.finish().unwrap()), plain);

        // Not a valid zlib or deflate stream: falls through to the bytes as-is
        let stored = b"\x00uncompressed section".to_vec();
        assert_eq!(decompress_section(&stored), stored);
    }

    #[test]
    fn test_extract_text_from_synthetic_container() {
        let s0 = zlib_compressed(&para_text_record("첫 번째 문단\n"));
        let s1 = zlib_compressed(&para_text_record("second section"));
        let file = build_hwp_container(&file_header(0), &[&s0, &s1]);

        let text = Hwp5RecordParser::extract_text(&file, "fixture.hwp").unwrap();
        assert_eq!(text, "첫 번째 문단\nsecond section");
    }

    #[test]
    fn test_extract_text_same_bytes_twice_is_identical() {
        let s0 = zlib_compressed(&para_text_record("idempotent 텍스트"));
        let file = build_hwp_container(&file_header(0), &[&s0]);

        let first = Hwp5RecordParser::extract_text(&file, "a.hwp").unwrap();
        let second = Hwp5RecordParser::extract_text(&file, "a.hwp").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_protected_container_short_circuits() {
        let s0 = zlib_compressed(&para_text_record("should never be read"));
        let file = build_hwp_container(&file_header(0x0000_0002), &[&s0]);

        let err = Hwp5RecordParser::extract_text(&file, "locked.hwp").unwrap_err();
        assert!(matches!(err, Error::PasswordProtected(_)));
    }
}

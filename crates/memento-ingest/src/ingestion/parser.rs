//! Format dispatch: one sniff, one parser, a `Document` list out.

use crate::error::{Error, Result};
use crate::types::{Document, FormatKind};

use super::format::FormatSniffer;
use super::hwp5::Hwp5RecordParser;
use super::hwpx::HwpxZipExtractor;
use super::office;
use super::pdf::PdfLayoutReconstructor;

/// Multi-format document parser.
///
/// Stateless across files: every call parses from scratch, so re-parsing the
/// same bytes always yields the same documents.
pub struct DocumentParser {
    /// PDF line-merge threshold in layout units
    pdf_line_gap: f32,
}

impl DocumentParser {
    pub fn new(pdf_line_gap: f32) -> Self {
        Self { pdf_line_gap }
    }

    /// Parse a file into its document list.
    ///
    /// Errors follow the file-level taxonomy: `Unsupported` for unknown
    /// extensions, `PasswordProtected` when probing detects encryption, and
    /// `CorruptContainer` when the container itself cannot be opened.
    pub fn parse(&self, filename: &str, data: &[u8]) -> Result<Vec<Document>> {
        let format = FormatSniffer::sniff(filename);
        tracing::debug!("[{}] parsing as {}", filename, format.display_name());

        let documents = match format {
            FormatKind::Hwp5 => {
                let text = Hwp5RecordParser::extract_text(data, filename)?;
                vec![Document::new(text, filename)]
            }
            FormatKind::Hwpx => {
                let text = HwpxZipExtractor::extract_text(data, filename)?;
                vec![Document::new(text, filename)]
            }
            FormatKind::Pdf => {
                PdfLayoutReconstructor::new(self.pdf_line_gap).extract_documents(data, filename)?
            }
            FormatKind::Docx => {
                vec![Document::new(office::extract_docx_text(data, filename)?, filename)]
            }
            FormatKind::Pptx => {
                vec![Document::new(office::extract_pptx_text(data, filename)?, filename)]
            }
            FormatKind::Xlsx => {
                vec![Document::new(office::extract_xlsx_text(data, filename)?, filename)]
            }
            FormatKind::Text => vec![Document::new(office::extract_plain_text(data), filename)],
            FormatKind::Unknown => {
                return Err(Error::Unsupported(
                    filename.rsplit('.').next().unwrap_or(filename).to_string(),
                ));
            }
        };

        Ok(documents)
    }

    /// File-level boundary for batch callers: a result-or-none plus an
    /// optional diagnostic. Nothing propagates past this call; the caller
    /// logs the diagnostic and moves on to the next file.
    pub fn parse_or_skip(&self, filename: &str, data: &[u8]) -> (Option<Vec<Document>>, Option<String>) {
        match self.parse(filename, data) {
            Ok(documents) => (Some(documents), None),
            Err(e) => {
                tracing::warn!("[{}] parse skipped: {}", filename, e);
                (None, Some(e.to_string()))
            }
        }
    }
}

impl Default for DocumentParser {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_PDF_LINE_GAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_extension_is_unsupported_not_panic() {
        let parser = DocumentParser::default();
        let err = parser.parse("archive.rar", b"whatever").unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));

        let (documents, diagnostic) = parser.parse_or_skip("archive.rar", b"whatever");
        assert!(documents.is_none());
        assert!(diagnostic.unwrap().contains("Unsupported"));
    }

    #[test]
    fn test_plain_text_single_document() {
        let parser = DocumentParser::default();
        let documents = parser.parse("메모.txt", "안녕하세요\n테스트".as_bytes()).unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].text, "안녕하세요\n테스트");
        assert_eq!(documents[0].metadata.source_name, "메모.txt");
        assert_eq!(documents[0].metadata.page_index, None);
    }

    #[test]
    fn test_corrupt_hwp_degrades_to_skip() {
        let parser = DocumentParser::default();
        let (documents, diagnostic) = parser.parse_or_skip("broken.hwp", b"not ole at all");
        assert!(documents.is_none());
        assert!(diagnostic.is_some());
    }
}

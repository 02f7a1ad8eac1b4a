//! Document and chunk types with provenance tracking

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Supported file formats, resolved once by the format sniffer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    /// HWP 5.0 binary document (OLE compound file)
    Hwp5,
    /// HWPX document (zip + namespaced XML)
    Hwpx,
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Docx,
    /// Microsoft PowerPoint presentation (.pptx)
    Pptx,
    /// Excel spreadsheet (.xlsx)
    Xlsx,
    /// Plain text file
    Text,
    /// Unknown file type
    Unknown,
}

impl FormatKind {
    /// Detect the format from a filename's extension (lower-cased)
    pub fn from_filename(filename: &str) -> Self {
        let extension = filename.rsplit('.').next().unwrap_or("").to_lowercase();

        match extension.as_str() {
            "hwp" => Self::Hwp5,
            "hwpx" => Self::Hwpx,
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "pptx" => Self::Pptx,
            "xlsx" => Self::Xlsx,
            "txt" | "text" => Self::Text,
            _ => Self::Unknown,
        }
    }

    /// Check if this is a supported file type
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Formats that can carry embedded images worth extracting
    pub fn supports_image_extraction(&self) -> bool {
        matches!(self, Self::Pdf | Self::Docx | Self::Pptx)
    }

    /// Get display name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Hwp5 => "HWP 5.0",
            Self::Hwpx => "HWPX",
            Self::Pdf => "PDF",
            Self::Docx => "Word Document (.docx)",
            Self::Pptx => "PowerPoint (.pptx)",
            Self::Xlsx => "Excel Spreadsheet (.xlsx)",
            Self::Text => "Text File",
            Self::Unknown => "Unknown",
        }
    }
}

/// Provenance metadata carried by every extracted document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Original filename as uploaded
    pub source_name: String,
    /// Page index (0-based, PDF only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_index: Option<u32>,
    /// Section index (0-based, HWP/HWPX only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_index: Option<u32>,
}

/// One logical unit of extracted text: the whole file for text formats,
/// one per page for PDFs.
///
/// `text` is never absent: pages or sections without content carry an empty
/// string so downstream indices stay aligned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Extracted text content
    pub text: String,
    /// Provenance metadata
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Create a whole-file document
    pub fn new(text: String, source_name: impl Into<String>) -> Self {
        Self {
            text,
            metadata: DocumentMetadata {
                source_name: source_name.into(),
                page_index: None,
                section_index: None,
            },
        }
    }

    /// Create a per-page document (0-based page index)
    pub fn for_page(text: String, source_name: impl Into<String>, page_index: u32) -> Self {
        Self {
            text,
            metadata: DocumentMetadata {
                source_name: source_name.into(),
                page_index: Some(page_index),
                section_index: None,
            },
        }
    }
}

/// A chunk of text produced by the chunker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Text content (placeholder tokens substituted after linking)
    pub text: String,
    /// Chunk index within the chunk set (0-based, contiguous)
    pub chunk_index: u32,
    /// Total chunks in the set, fixed up once splitting is complete
    pub total_chunks: u32,
    /// Character count of `text` at chunking time
    pub content_length: usize,
    /// Original filename
    pub source_name: String,
    /// Page number (1-based) reconciled from the document's 0-based page index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    /// LLM-generated section title, filled in after chunking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
    /// IDs of images whose placeholders were resolved inside this chunk
    #[serde(default)]
    pub extracted_images: Vec<String>,
}

impl Chunk {
    /// Create a new chunk; indices are fixed up post-hoc by the chunker
    pub fn new(text: String, source_name: String, page_number: Option<u32>) -> Self {
        let content_length = text.chars().count();
        Self {
            id: Uuid::new_v4(),
            text,
            chunk_index: 0,
            total_chunks: 0,
            content_length,
            source_name,
            page_number,
            section_title: None,
            extracted_images: Vec::new(),
        }
    }

    /// Number of images linked into this chunk
    pub fn image_count(&self) -> usize {
        self.extracted_images.len()
    }
}

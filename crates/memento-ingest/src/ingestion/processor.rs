//! Ingestion pipeline orchestration: the surface batch workers and the API
//! layer call into.

use std::collections::HashMap;

use crate::config::IngestConfig;
use crate::error::Result;
use crate::types::{Chunk, Document, ExtractedImage};

use super::chunker::TextChunker;
use super::images;
use super::linker::ImagePlaceholderLinker;
use super::parser::DocumentParser;

/// Main ingestion pipeline: parse, chunk, extract images, link captions.
///
/// Holds configuration only; all per-file state lives inside one call.
pub struct IngestPipeline {
    parser: DocumentParser,
    chunker: TextChunker,
}

impl IngestPipeline {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            parser: DocumentParser::new(config.pdf.line_gap),
            chunker: TextChunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap),
        }
    }

    /// Parse a file into documents; `None` plus a diagnostic for unsupported
    /// or unreadable files (never an error across this boundary)
    pub fn parse(&self, filename: &str, data: &[u8]) -> (Option<Vec<Document>>, Option<String>) {
        self.parser.parse_or_skip(filename, data)
    }

    /// Parse with the typed file-level error taxonomy, for callers that
    /// classify outcomes themselves
    pub fn parse_file(&self, filename: &str, data: &[u8]) -> Result<Vec<Document>> {
        self.parser.parse(filename, data)
    }

    /// Chunk a document list with index/total fix-up
    pub fn chunk(&self, documents: &[Document]) -> Vec<Chunk> {
        self.chunker.chunk_documents(documents)
    }

    /// Extract embedded images with deterministic ids
    pub fn extract_images(
        &self,
        data: &[u8],
        filename: &str,
        file_id: &str,
    ) -> Result<Vec<ExtractedImage>> {
        images::extract_images(data, filename, file_id)
    }

    /// Substitute image placeholders with captions, updating per-chunk image
    /// metadata in place
    pub fn link_images(
        &self,
        chunks: &mut [Chunk],
        extracted_images: &[ExtractedImage],
        captions: &HashMap<String, String>,
    ) {
        ImagePlaceholderLinker::link_images(chunks, extracted_images, captions);
    }
}

impl Default for IngestPipeline {
    fn default() -> Self {
        Self::new(&IngestConfig::default())
    }
}

//! memento-ingest: document ingestion and chunk-alignment pipeline
//!
//! Turns uploaded files (HWP 5.0, HWPX, PDF, DOCX, PPTX, XLSX, plain text)
//! into an ordered sequence of text chunks with provenance metadata, and
//! binds extracted embedded images to the exact chunk their placeholder
//! occupies. Embedding, storage and the HTTP surface are external
//! collaborators behind the `providers` traits.

pub mod config;
pub mod error;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod types;

pub use config::IngestConfig;
pub use error::{Error, Result};
pub use ingestion::IngestPipeline;
pub use types::{Chunk, Document, DocumentMetadata, ExtractedImage, FormatKind, PlaceholderToken};

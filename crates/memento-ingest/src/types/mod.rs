//! Core data types shared across the pipeline

pub mod document;
pub mod image;

pub use document::{Chunk, Document, DocumentMetadata, FormatKind};
pub use image::{ExtractedImage, PlaceholderToken};

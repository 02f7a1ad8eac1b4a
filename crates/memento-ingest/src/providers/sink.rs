//! External collaborator contracts: the vector store downstream and the file
//! storage upstream. Both are trait boundaries; this crate never embeds or
//! persists anything itself.

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::types::Chunk;

/// Downstream embedding + vector storage collaborator
#[async_trait]
pub trait VectorSink: Send + Sync {
    /// Embed and persist a chunk batch; `false` means the store rejected it
    async fn embed_and_store(&self, chunks: &[Chunk]) -> Result<bool>;
}

/// Upstream storage read: the only dependency the parser needs
#[async_trait]
pub trait FileSource: Send + Sync {
    async fn read(&self, path: &str) -> Result<Vec<u8>>;
}

/// Logging sink for tests and offline runs
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl VectorSink for NullSink {
    async fn embed_and_store(&self, chunks: &[Chunk]) -> Result<bool> {
        tracing::info!("null sink dropped {} chunks", chunks.len());
        Ok(true)
    }
}

/// Local filesystem source
#[derive(Debug, Default)]
pub struct LocalFileSource;

#[async_trait]
impl FileSource for LocalFileSource {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(Path::new(path)).await?)
    }
}

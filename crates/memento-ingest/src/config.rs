//! Configuration for the ingestion pipeline

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Default PDF line-merge threshold in layout units.
///
/// Empirically chosen paragraph-break distance; tune per corpus rather than
/// treating it as exact.
pub const DEFAULT_PDF_LINE_GAP: f32 = 20.0;

/// Main ingestion configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// PDF layout reconstruction configuration
    #[serde(default)]
    pub pdf: PdfConfig,
    /// Captioning / section-title LLM configuration
    #[serde(default)]
    pub captioning: CaptionConfig,
    /// Batch processing configuration
    #[serde(default)]
    pub processing: ProcessingConfig,
}

impl IngestConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&raw).map_err(|e| Error::Config(e.to_string()))
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            chunk_overlap: 400,
        }
    }
}

/// PDF layout reconstruction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfConfig {
    /// Vertical gap between lines that still belongs to one text block
    pub line_gap: f32,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            line_gap: DEFAULT_PDF_LINE_GAP,
        }
    }
}

/// Captioning and section-title generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionConfig {
    /// OpenAI-compatible API base URL
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Model used for image captions and section titles
    pub model: String,
    /// Maximum concurrent requests in flight
    pub max_concurrency: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for failed requests
    pub max_retries: u32,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_concurrency: 10,
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

/// Batch processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Number of files processed in parallel (default: CPU count, max 8)
    pub parallel_files: Option<usize>,
    /// Timeout for processing a single file in seconds
    pub file_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_files: None,
            file_timeout_secs: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_values() {
        let config = IngestConfig::default();
        assert_eq!(config.chunking.chunk_size, 2000);
        assert_eq!(config.chunking.chunk_overlap, 400);
        assert_eq!(config.pdf.line_gap, 20.0);
        assert_eq!(config.captioning.max_concurrency, 10);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: IngestConfig = toml::from_str(
            r#"
            [chunking]
            chunk_size = 1000
            chunk_overlap = 100
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.pdf.line_gap, 20.0);
        assert_eq!(config.captioning.model, "gpt-4o-mini");
    }
}

//! LLM provider trait for image captioning and section-title generation

use async_trait::async_trait;

use crate::error::Result;

/// Trait for the external LLM collaborator.
///
/// Implementations:
/// - `OpenAiVision`: OpenAI-compatible chat completions endpoint
/// - test doubles in the caption/worker tests
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Describe an image for retrieval; `format` is the short extension
    /// ("jpg", "png") used to build the data URL
    async fn caption_image(&self, image_bytes: &[u8], format: &str) -> Result<String>;

    /// Generate a short section title for a chunk snippet
    async fn section_title(&self, snippet: &str) -> Result<String>;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model in use
    fn model(&self) -> &str;
}

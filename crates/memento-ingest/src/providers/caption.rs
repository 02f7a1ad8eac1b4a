//! Bounded caption and title fan-out over the LLM collaborator.
//!
//! Concurrency is capped by a semaphore to respect upstream rate limits;
//! results stay index-aligned with the inputs regardless of completion order.
//! A failed call degrades to an empty string and never fails the file.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Semaphore;

use crate::types::{Chunk, ExtractedImage};

use super::llm::LlmProvider;

/// Snippet length fed to section-title generation
const TITLE_SNIPPET_CHARS: usize = 300;

/// Caption every unique image id exactly once.
///
/// Duplicate ids (the same image referenced from several chunks) are captioned
/// a single time; the returned map always contains an entry per unique id,
/// empty when captioning failed.
pub async fn caption_images(
    provider: Arc<dyn LlmProvider>,
    images: &[ExtractedImage],
    max_concurrency: usize,
) -> HashMap<String, String> {
    let mut unique: Vec<&ExtractedImage> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for image in images {
        if seen.insert(image.image_id.as_str()) {
            unique.push(image);
        }
    }

    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let tasks = unique.iter().map(|image| {
        let provider = provider.clone();
        let semaphore = semaphore.clone();
        let image_id = image.image_id.clone();
        let format = image.format.clone();
        let bytes = image.bytes.clone();
        async move {
            let _permit = semaphore.acquire().await.expect("semaphore closed");
            let caption = match provider.caption_image(&bytes, &format).await {
                Ok(caption) => caption,
                Err(e) => {
                    tracing::warn!("caption failed for {}: {}", image_id, e);
                    String::new()
                }
            };
            (image_id, caption)
        }
    });

    join_all(tasks).await.into_iter().collect()
}

/// Generate one section title per chunk, order preserved.
///
/// The snippet is the first 300 characters with newlines flattened, matching
/// what the title model was tuned on. Failures yield empty titles.
pub async fn generate_section_titles(
    provider: Arc<dyn LlmProvider>,
    chunks: &[Chunk],
    max_concurrency: usize,
) -> Vec<String> {
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let tasks = chunks.iter().map(|chunk| {
        let provider = provider.clone();
        let semaphore = semaphore.clone();
        let snippet: String = chunk
            .text
            .chars()
            .take(TITLE_SNIPPET_CHARS)
            .collect::<String>()
            .replace('\n', " ");
        async move {
            let _permit = semaphore.acquire().await.expect("semaphore closed");
            match provider.section_title(&snippet).await {
                Ok(title) => title,
                Err(e) => {
                    tracing::warn!("section title failed: {}", e);
                    String::new()
                }
            }
        }
    });

    join_all(tasks).await
}

/// Apply generated titles onto chunks; empty titles leave the field unset
pub fn apply_section_titles(chunks: &mut [Chunk], titles: &[String]) {
    for (chunk, title) in chunks.iter_mut().zip(titles) {
        if !title.trim().is_empty() {
            chunk.section_title = Some(title.trim().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl LlmProvider for CountingProvider {
        async fn caption_image(&self, image_bytes: &[u8], _format: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(marker) = self.fail_on {
                if image_bytes == marker.as_bytes() {
                    return Err(Error::caption("simulated failure"));
                }
            }
            Ok(format!("caption of {} bytes", image_bytes.len()))
        }

        async fn section_title(&self, snippet: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(snippet.chars().take(4).collect())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "counting"
        }

        fn model(&self) -> &str {
            "test"
        }
    }

    fn image(id: &str, bytes: &[u8]) -> ExtractedImage {
        ExtractedImage {
            image_id: id.to_string(),
            page_number: Some(1),
            image_index: Some(0),
            format: "png".to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_ids_captioned_once() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            fail_on: None,
        });
        let images = vec![image("a", b"xx"), image("a", b"xx"), image("b", b"yyy")];

        let captions = caption_images(provider.clone(), &images, 10).await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(captions.len(), 2);
        assert_eq!(captions["a"], "caption of 2 bytes");
        assert_eq!(captions["b"], "caption of 3 bytes");
    }

    #[tokio::test]
    async fn test_caption_failure_degrades_to_empty() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            fail_on: Some("bad"),
        });
        let images = vec![image("ok", b"fine"), image("broken", b"bad")];

        let captions = caption_images(provider, &images, 10).await;

        assert_eq!(captions["ok"], "caption of 4 bytes");
        assert_eq!(captions["broken"], "");
    }

    #[tokio::test]
    async fn test_titles_are_index_aligned() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            fail_on: None,
        });
        let chunks: Vec<Chunk> = ["첫번째 청크", "두번째 청크", "세번째 청크"]
            .iter()
            .map(|t| Chunk::new(t.to_string(), "f.txt".to_string(), None))
            .collect();

        let titles = generate_section_titles(provider, &chunks, 2).await;

        assert_eq!(titles, vec!["첫번째 ", "두번째 ", "세번째 "]);

        let mut chunks = chunks;
        apply_section_titles(&mut chunks, &titles);
        assert_eq!(chunks[0].section_title.as_deref(), Some("첫번째"));
    }
}

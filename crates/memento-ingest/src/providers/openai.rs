//! OpenAI-compatible chat completions client for captions and titles

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::CaptionConfig;
use crate::error::{Error, Result};

use super::llm::LlmProvider;

/// Vision-capable chat completions client.
///
/// Images travel as base64 data URLs; both calls run at temperature 0 with a
/// small retry loop, since caption failures must stay cheap to absorb.
pub struct OpenAiVision {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl OpenAiVision {
    pub fn new(config: &CaptionConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| Error::Config(format!("{} is not set", config.api_key_env)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    async fn chat(&self, messages: Value, max_tokens: u32) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0,
            "max_tokens": max_tokens,
        });

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
            }
            let response = self
                .client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match response {
                Ok(response) if response.status().is_success() => {
                    let payload: Value = response.json().await?;
                    let content = payload["choices"][0]["message"]["content"]
                        .as_str()
                        .unwrap_or("")
                        .trim()
                        .to_string();
                    return Ok(content);
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    last_error = Some(Error::caption(format!("HTTP {}: {}", status, text)));
                }
                Err(e) => last_error = Some(Error::Http(e)),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::caption("request never attempted")))
    }
}

#[async_trait]
impl LlmProvider for OpenAiVision {
    async fn caption_image(&self, image_bytes: &[u8], format: &str) -> Result<String> {
        let mime = match format {
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            _ => "image/png",
        };
        let encoded = base64::engine::general_purpose::STANDARD.encode(image_bytes);
        let data_url = format!("data:{};base64,{}", mime, encoded);

        let messages = json!([{
            "role": "user",
            "content": [
                {
                    "type": "text",
                    "text": "이 이미지를 문서 검색에 쓸 수 있도록 한두 문장으로 설명하세요.",
                },
                {
                    "type": "image_url",
                    "image_url": { "url": data_url },
                },
            ],
        }]);

        self.chat(messages, 300).await
    }

    async fn section_title(&self, snippet: &str) -> Result<String> {
        let messages = json!([{
            "role": "user",
            "content": format!(
                "다음 문서 내용에 어울리는 소제목(10자 이내)을 생성하세요.\n\n{}",
                snippet
            ),
        }]);

        self.chat(messages, 50).await
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

use async_trait::async_trait;
use serde_json::json;

use crate::error::CompletionError;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4";

/// A text-completion service that answers one system + user prompt pair.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, CompletionError>;

    fn provider_name(&self) -> &'static str;
}

/// OpenAI-compatible chat completions client.
pub struct OpenAIClient {
    pub model: String,
    pub api_key: String,
    pub temperature: f32,
    pub base_url: String,
    pub client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(model: String, api_key: String, base_url: String, client: reqwest::Client) -> Self {
        Self {
            model,
            api_key,
            temperature: 0.0,
            base_url,
            client,
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAIClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt },
            ],
            "temperature": self.temperature,
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let json: serde_json::Value =
            resp.json()
                .await
                .map_err(|e| CompletionError::InvalidResponse {
                    message: e.to_string(),
                })?;

        // choices[0].message.content
        json.pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| CompletionError::InvalidResponse {
                message: "completion response missing content".to_string(),
            })
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

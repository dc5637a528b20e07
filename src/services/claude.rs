use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::services::summary::TextGenerator;

const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_TOKENS: u32 = 1024;
const TEMPERATURE: f64 = 0.5;

/// Anthropic Messages API client.
#[derive(Clone)]
pub struct ClaudeClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl ClaudeClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            api_url: config.claude_api_url.trim_end_matches('/').to_string(),
            api_key: config.claude_api_key.clone(),
            model: config.claude_model.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for ClaudeClient {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let response = self
            .http
            .post(format!("{}/v1/messages", self.api_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&serde_json::json!({
                "model": self.model,
                "max_tokens": MAX_TOKENS,
                "temperature": TEMPERATURE,
                "messages": [{
                    "role": "user",
                    "content": prompt
                }]
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Claude API error {}: {}", status, body);
        }

        let claude_response: serde_json::Value = response.json().await?;
        let text = claude_response["content"][0]["text"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Claude response has no text content"))?;

        Ok(text.to_string())
    }
}

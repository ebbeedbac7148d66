use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use super::Generator;
use crate::config::GenerationConfig;

/// Generator backed by an OpenAI-compatible chat completions endpoint
pub struct ChatCompletionsGenerator {
    client: Client,
    api_url: String,
    model: String,
    api_key: String,
}

impl ChatCompletionsGenerator {
    pub fn new(config: &GenerationConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl Generator for ChatCompletionsGenerator {
    async fn generate(&self, prompt: &str, temperature: f32, max_output_tokens: u32) -> Result<String> {
        tracing::debug!("POST {} (model {})", self.api_url, self.model);

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    {
                        "role": "user",
                        "content": prompt,
                    },
                ],
                "temperature": temperature,
                "max_tokens": max_output_tokens,
            }))
            .send()
            .await
            .context("Generation request failed")?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read generation response")?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));

        if !status.is_success() {
            anyhow::bail!("HTTP {}: {}", status, api_error_message(&body));
        }

        extract_content(&body)
    }
}

/// Pull the assistant message text out of a chat completions response
fn extract_content(body: &Value) -> Result<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid API response: {}", body))
}

/// Best-effort error text from an OpenAI-style error body
pub(crate) fn api_error_message(body: &Value) -> String {
    if let Value::String(raw) = body {
        return raw.clone();
    }
    body["error"]["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

use async_trait::async_trait;
use std::sync::Arc;

pub mod openai;
pub mod styles;

pub use openai::ChatCompletionsGenerator;
pub use styles::SummaryStyle;

use crate::error::{PipelineError, Result};
use crate::transcript::Passage;

/// Trait for text generation services
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    /// Complete `prompt`, returning the raw model text
    async fn generate(
        &self,
        prompt: &str,
        temperature: f32,
        max_output_tokens: u32,
    ) -> anyhow::Result<String>;
}

/// Applies style prompts to passages and merges chunk summaries
pub struct Summarizer {
    generator: Arc<dyn Generator>,
    max_output_tokens: u32,
}

impl Summarizer {
    pub fn new(generator: Arc<dyn Generator>, max_output_tokens: u32) -> Self {
        Self {
            generator,
            max_output_tokens,
        }
    }

    /// Summarize a passage with the style's direct prompt
    pub async fn summarize(&self, passage: &Passage, style: SummaryStyle) -> Result<String> {
        let prompt = style.render_direct(passage);
        self.request(&prompt, style).await
    }

    /// Merge per-chunk summaries into one with the style's condensation prompt
    pub async fn condense(&self, chunk_summaries: &[String], style: SummaryStyle) -> Result<String> {
        let prompt = style.render_condense(chunk_summaries);
        self.request(&prompt, style).await
    }

    async fn request(&self, prompt: &str, style: SummaryStyle) -> Result<String> {
        tracing::debug!(
            "Requesting {} summary ({} prompt chars, temperature {})",
            style,
            prompt.len(),
            style.temperature()
        );

        let text = self
            .generator
            .generate(prompt, style.temperature(), self.max_output_tokens)
            .await
            .map_err(|e| PipelineError::GenerationError(format!("{:#}", e)))?;

        let text = text.trim();
        if text.is_empty() {
            return Err(PipelineError::GenerationError(
                "model returned an empty response".to_string(),
            ));
        }

        Ok(text.to_string())
    }
}

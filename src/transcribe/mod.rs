use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::config::{self, SttBackend, TranscriptionConfig};
use crate::transcript::TranscriptSegment;

pub mod aws;
pub mod openai;
pub mod processor;

pub use aws::AwsTranscriber;
pub use openai::WhisperTranscriber;

/// Output of a speech-to-text service
#[derive(Debug, Clone, Default)]
pub struct SpeechTranscript {
    pub segments: Vec<TranscriptSegment>,

    /// Language reported by the service, if any
    pub language: Option<String>,
}

/// Turns an audio file into timed text
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> Result<SpeechTranscript>;
}

/// Build the configured speech-to-text backend
pub async fn build_backend(config: &TranscriptionConfig) -> Result<Arc<dyn SpeechToText>> {
    match config.backend {
        SttBackend::Openai => {
            let api_key = config::api_key(&config.api_key_env)?;
            Ok(Arc::new(WhisperTranscriber::new(config, api_key)?))
        }
        SttBackend::Aws => Ok(Arc::new(AwsTranscriber::new(config).await)),
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::{SpeechToText, SpeechTranscript};
use crate::acquire::AudioFormat;
use crate::config::TranscriptionConfig;
use crate::summarize::openai::api_error_message;
use crate::transcript::TranscriptSegment;

/// Whisper `verbose_json` response
#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    text: String,
}

/// Speech-to-text via an OpenAI-compatible `/audio/transcriptions` endpoint
pub struct WhisperTranscriber {
    client: Client,
    api_url: String,
    model: String,
    api_key: String,
    language: Option<String>,
}

impl WhisperTranscriber {
    pub fn new(config: &TranscriptionConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            api_key,
            language: config.language.clone(),
        })
    }
}

#[async_trait]
impl SpeechToText for WhisperTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<SpeechTranscript> {
        let bytes = tokio::fs::read(audio)
            .await
            .with_context(|| format!("Failed to read audio file {}", audio.display()))?;

        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.mp3".to_string());
        let mime = AudioFormat::from_path(audio)
            .unwrap_or(AudioFormat::Mp3)
            .mime_type();

        let file = Part::bytes(bytes).file_name(file_name).mime_str(mime)?;
        let mut form = Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment");
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        tracing::debug!("POST {} (model {})", self.api_url, self.model);
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Transcription request failed")?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read transcription response")?;

        if !status.is_success() {
            let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
            anyhow::bail!("HTTP {}: {}", status, api_error_message(&body));
        }

        let parsed: VerboseTranscription =
            serde_json::from_str(&text).context("Failed to parse transcription response")?;
        Ok(into_speech_transcript(parsed))
    }
}

fn into_speech_transcript(parsed: VerboseTranscription) -> SpeechTranscript {
    let segments = if parsed.segments.is_empty() {
        vec![TranscriptSegment::new(0.0, parsed.text)]
    } else {
        parsed
            .segments
            .into_iter()
            .map(|s| TranscriptSegment::new(s.start, s.text))
            .collect()
    };

    SpeechTranscript {
        segments,
        language: parsed.language,
    }
}

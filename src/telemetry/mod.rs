use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::TelemetryConfig;
use crate::error::{ErrorKind, PipelineError};
use crate::pipeline::SummaryResult;
use crate::summarize::SummaryStyle;

/// Outcome of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageStatus {
    Success,
    /// Captions were unavailable and every download strategy failed
    BothMethodsFailed,
    AcquisitionFailed,
    GenerationFailed,
    Cancelled,
}

impl UsageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageStatus::Success => "success",
            UsageStatus::BothMethodsFailed => "both_methods_failed",
            UsageStatus::AcquisitionFailed => "acquisition_failed",
            UsageStatus::GenerationFailed => "generation_failed",
            UsageStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_error(err: &PipelineError) -> Self {
        match err.kind() {
            ErrorKind::DownloadFailed => UsageStatus::BothMethodsFailed,
            ErrorKind::GenerationError => UsageStatus::GenerationFailed,
            ErrorKind::Cancelled => UsageStatus::Cancelled,
            ErrorKind::InvalidUrl
            | ErrorKind::NoCaptionsAvailable
            | ErrorKind::CompressionFailed
            | ErrorKind::TranscriptionError
            | ErrorKind::Config => UsageStatus::AcquisitionFailed,
        }
    }
}

impl fmt::Display for UsageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A usage record, sent once per run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageEvent {
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub style: SummaryStyle,
    pub status: UsageStatus,

    /// `captions`, `speech_to_text` or `cache` on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl UsageEvent {
    pub fn from_outcome(
        url: &str,
        style: SummaryStyle,
        outcome: &std::result::Result<SummaryResult, PipelineError>,
    ) -> Self {
        let (status, method) = match outcome {
            Ok(result) => {
                let method = if result.from_cache {
                    "cache"
                } else {
                    result.acquisition_method.as_str()
                };
                (UsageStatus::Success, Some(method.to_string()))
            }
            Err(err) => (UsageStatus::from_error(err), None),
        };

        Self {
            timestamp: Utc::now(),
            url: url.to_string(),
            style,
            status,
            method,
        }
    }
}

/// Destination for usage events. Implementations never fail the run.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn record(&self, event: &UsageEvent);
}

/// Discards events
pub struct NoopSink;

#[async_trait]
impl UsageSink for NoopSink {
    async fn record(&self, event: &UsageEvent) {
        tracing::debug!("Telemetry disabled, dropping {} event", event.status);
    }
}

/// POSTs each event as JSON to a webhook
pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    async fn send(&self, event: &UsageEvent) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .context("Webhook request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Webhook returned HTTP {}", response.status());
        }
        Ok(())
    }
}

#[async_trait]
impl UsageSink for WebhookSink {
    async fn record(&self, event: &UsageEvent) {
        match self.send(event).await {
            Ok(()) => tracing::debug!("Recorded {} event", event.status),
            Err(e) => tracing::warn!("Failed to record usage event: {:#}", e),
        }
    }
}

/// Webhook sink when a URL is configured, otherwise no-op
pub fn from_config(config: &TelemetryConfig) -> Result<Arc<dyn UsageSink>> {
    match config.webhook_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => Ok(Arc::new(WebhookSink::new(url)?)),
        _ => Ok(Arc::new(NoopSink)),
    }
}

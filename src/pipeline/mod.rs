use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub mod cache;

pub use cache::TranscriptCache;

use crate::acquire::{Acquirer, TranscriptSource};
use crate::chunker;
use crate::config::{self, Config, GenerationConfig};
use crate::error::{PipelineError, Result};
use crate::summarize::{ChatCompletionsGenerator, Summarizer, SummaryStyle};
use crate::telemetry::{self, UsageEvent, UsageSink};
use crate::tokens::estimate_tokens;
use crate::transcript::{AcquisitionMethod, Transcript};

/// Cooperative cancellation flag shared between a caller and a run
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Raise the signal, returning whether it was already raised
    pub fn interrupt(&self) -> bool {
        self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the signal has been raised
    pub fn check(&self) -> Result<()> {
        if self.is_raised() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }
}

/// Per-run options
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Always chunk, even when the transcript fits the context window
    pub deep: bool,
}

/// Token budget used for the chunking decision
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub context_limit: usize,
    pub reserved_output_tokens: usize,
    pub chunk_token_threshold: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

impl PipelineSettings {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            context_limit: config.context_limit,
            reserved_output_tokens: config.max_output_tokens as usize,
            chunk_token_threshold: config.chunk_token_threshold,
        }
    }

    /// Whether a transcript of `estimated_tokens` must be chunked
    pub fn needs_chunking(&self, estimated_tokens: usize, deep: bool) -> bool {
        deep || estimated_tokens + self.reserved_output_tokens > self.context_limit
    }
}

/// Result of a summarization run
#[derive(Debug, Clone, Serialize)]
pub struct SummaryResult {
    pub final_summary: String,

    /// Per-chunk summaries, in transcript order, when the transcript was chunked
    pub chunk_summaries: Option<Vec<String>>,

    pub style: SummaryStyle,

    /// Estimated tokens of the full transcript
    pub token_count_estimate: usize,

    pub acquisition_method: AcquisitionMethod,

    /// Whether the transcript came from the pipeline's cache
    pub from_cache: bool,
}

/// Sequences acquisition, chunking and summarization, caching transcripts
/// by URL for the pipeline's lifetime
pub struct Pipeline {
    source: Arc<dyn TranscriptSource>,
    summarizer: Summarizer,
    telemetry: Arc<dyn UsageSink>,
    cache: TranscriptCache,
    settings: PipelineSettings,
    stop: StopSignal,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn TranscriptSource>,
        summarizer: Summarizer,
        telemetry: Arc<dyn UsageSink>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            summarizer,
            telemetry,
            cache: TranscriptCache::new(),
            settings,
            stop: StopSignal::new(),
        }
    }

    /// Build the production pipeline: yt-dlp/ffmpeg acquisition, the
    /// configured speech-to-text backend, chat completions and telemetry
    pub async fn from_config(config: &Config, stop: StopSignal) -> anyhow::Result<Self> {
        let acquirer = Acquirer::from_config(config)
            .await?
            .with_stop_signal(stop.clone());

        let api_key = config::api_key(&config.generation.api_key_env)?;
        let generator = ChatCompletionsGenerator::new(&config.generation, api_key)?;
        let summarizer = Summarizer::new(Arc::new(generator), config.generation.max_output_tokens);

        Ok(Self::new(
            Arc::new(acquirer),
            summarizer,
            telemetry::from_config(&config.telemetry)?,
            PipelineSettings::from_config(&config.generation),
        )
        .with_stop_signal(stop))
    }

    /// Share a stop signal checked between chunks
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Transcript cached for `url`, if it has been acquired
    pub fn cached_transcript(&self, url: &str) -> Option<Arc<Transcript>> {
        self.cache.get(url)
    }

    pub async fn run(&mut self, url: &str, style: SummaryStyle) -> Result<SummaryResult> {
        self.run_with(url, style, RunOptions::default()).await
    }

    /// Summarize `url` in `style`. Exactly one usage event is recorded,
    /// whatever the outcome.
    pub async fn run_with(
        &mut self,
        url: &str,
        style: SummaryStyle,
        options: RunOptions,
    ) -> Result<SummaryResult> {
        let outcome = self.execute(url, style, options).await;

        match &outcome {
            Ok(result) => tracing::info!(
                "Summary complete ({} via {}{})",
                style,
                result.acquisition_method,
                if result.from_cache { ", cached" } else { "" }
            ),
            Err(e) => tracing::error!("Run failed [{}]: {}", e.kind(), e),
        }

        let event = UsageEvent::from_outcome(url, style, &outcome);
        self.telemetry.record(&event).await;

        outcome
    }

    async fn execute(
        &mut self,
        url: &str,
        style: SummaryStyle,
        options: RunOptions,
    ) -> Result<SummaryResult> {
        self.stop.check()?;
        let (transcript, from_cache) = self.transcript_for(url).await?;

        let token_count = estimate_tokens(transcript.full_text());
        // Timestamped prompts carry an `[m:ss] ` prefix per segment
        let prompt_tokens = if style.uses_timestamps() {
            estimate_tokens(&transcript.as_passage().timestamped_lines())
        } else {
            token_count
        };
        let needs_chunking = self.settings.needs_chunking(prompt_tokens, options.deep);
        tracing::info!(
            "Transcript: {} words, ~{} tokens ({} as prompt); chunking: {}",
            transcript.word_count(),
            token_count,
            prompt_tokens,
            if needs_chunking { "yes" } else { "no" }
        );

        let (final_summary, chunk_summaries) = if needs_chunking {
            let (summary, parts) = self.summarize_chunked(&transcript, style).await?;
            (summary, Some(parts))
        } else {
            let summary = self
                .summarizer
                .summarize(&transcript.as_passage(), style)
                .await?;
            (summary, None)
        };

        Ok(SummaryResult {
            final_summary,
            chunk_summaries,
            style,
            token_count_estimate: token_count,
            acquisition_method: transcript.method(),
            from_cache,
        })
    }

    async fn transcript_for(&mut self, url: &str) -> Result<(Arc<Transcript>, bool)> {
        if let Some(hit) = self.cache.get(url) {
            tracing::info!("Using cached transcript for {}", url);
            return Ok((hit, true));
        }

        let transcript = self.source.acquire(url).await?;
        Ok((self.cache.insert(url, transcript), false))
    }

    /// Map: summarize each chunk in order. Reduce: condense the summaries.
    async fn summarize_chunked(
        &self,
        transcript: &Transcript,
        style: SummaryStyle,
    ) -> Result<(String, Vec<String>)> {
        let chunks = chunker::chunk(transcript.full_text(), self.settings.chunk_token_threshold);
        tracing::info!(
            "Split transcript into {} chunks of up to ~{} tokens",
            chunks.len(),
            self.settings.chunk_token_threshold
        );

        let mut summaries = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            self.stop.check()?;
            tracing::info!(
                "Summarizing chunk {}/{} (~{} tokens)",
                chunk.index + 1,
                chunks.len(),
                chunk.estimated_tokens
            );
            let passage = transcript.passage(chunk.words.clone());
            summaries.push(self.summarizer.summarize(&passage, style).await?);
        }

        self.stop.check()?;
        tracing::info!("Condensing {} chunk summaries", summaries.len());
        let final_summary = self.summarizer.condense(&summaries, style).await?;

        Ok((final_summary, summaries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::summarize::MockGenerator;
    use crate::transcript::TranscriptSegment;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct FixedSource {
        words: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TranscriptSource for FixedSource {
        async fn acquire(&self, _url: &str) -> Result<Transcript> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let segments = (0..self.words)
                .map(|i| TranscriptSegment::new(i as f64, "word"));
            Ok(Transcript::from_segments(segments, AcquisitionMethod::Captions)
                .expect("non-empty transcript"))
        }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<UsageEvent>>);

    #[async_trait]
    impl UsageSink for RecordingSink {
        async fn record(&self, event: &UsageEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    fn pipeline(words: usize, generator: MockGenerator) -> (Pipeline, Arc<FixedSource>, Arc<RecordingSink>) {
        let source = Arc::new(FixedSource {
            words,
            calls: AtomicUsize::new(0),
        });
        let sink = Arc::new(RecordingSink::default());
        let pipeline = Pipeline::new(
            source.clone(),
            Summarizer::new(Arc::new(generator), 900),
            sink.clone(),
            PipelineSettings::default(),
        );
        (pipeline, source, sink)
    }

    #[test]
    fn test_chunking_decision() {
        let settings = PipelineSettings::default();
        assert!(!settings.needs_chunking(7292, false));
        assert!(settings.needs_chunking(7293, false));
        assert!(settings.needs_chunking(10, true));
    }

    #[test]
    fn test_second_interrupt_is_reported() {
        let stop = StopSignal::new();
        assert!(!stop.interrupt());
        assert!(stop.is_raised());
        assert!(stop.interrupt());
    }

    #[tokio::test]
    async fn test_quotes_budget_counts_timestamps() {
        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .times(1)
            .returning(|_, _, _| Ok("direct".to_string()));
        let (mut plain, _, _) = pipeline(7000, generator);
        let basic = plain.run("https://youtu.be/dQw4w9WgXcQ", SummaryStyle::Basic).await.unwrap();
        assert_eq!(basic.chunk_summaries, None);

        // 3 chunks of at most 3000 tokens, then the condensation
        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .times(4)
            .returning(|_, _, _| Ok("part".to_string()));
        let (mut timestamped, _, _) = pipeline(7000, generator);
        let quotes = timestamped
            .run("https://youtu.be/dQw4w9WgXcQ", SummaryStyle::Quotes)
            .await
            .unwrap();
        assert_eq!(quotes.chunk_summaries.map(|p| p.len()), Some(3));
        assert_eq!(quotes.token_count_estimate, 7000);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_acquisition() {
        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .times(2)
            .returning(|_, _, _| Ok("summary".to_string()));
        let (mut pipeline, source, sink) = pipeline(50, generator);

        let first = pipeline.run("https://youtu.be/dQw4w9WgXcQ", SummaryStyle::Basic).await.unwrap();
        let second = pipeline.run("https://youtu.be/dQw4w9WgXcQ", SummaryStyle::Bullets).await.unwrap();

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].method.as_deref(), Some("captions"));
        assert_eq!(events[1].method.as_deref(), Some("cache"));
    }

    #[tokio::test]
    async fn test_deep_mode_chunks_short_transcript() {
        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .times(2)
            .returning(|prompt, _, _| {
                Ok(if prompt.contains("word word") {
                    "chunk summary".to_string()
                } else {
                    "condensed".to_string()
                })
            });
        let (mut pipeline, _, _) = pipeline(20, generator);

        let result = pipeline
            .run_with(
                "https://youtu.be/dQw4w9WgXcQ",
                SummaryStyle::Basic,
                RunOptions { deep: true },
            )
            .await
            .unwrap();
        assert_eq!(result.chunk_summaries, Some(vec!["chunk summary".to_string()]));
        assert_eq!(result.final_summary, "condensed");
    }

    #[tokio::test]
    async fn test_generation_failure_recorded_once() {
        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .times(1)
            .returning(|_, _, _| Err(anyhow::anyhow!("HTTP 429: rate limited")));
        let (mut pipeline, _, sink) = pipeline(50, generator);

        let err = pipeline
            .run("https://youtu.be/dQw4w9WgXcQ", SummaryStyle::Newbie)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GenerationError);
        assert!(err.to_string().contains("rate limited"));

        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, telemetry::UsageStatus::GenerationFailed);
    }

    #[tokio::test]
    async fn test_stop_signal_cancels_before_acquisition() {
        let mut generator = MockGenerator::new();
        generator.expect_generate().never();
        let (pipeline, source, sink) = pipeline(50, generator);
        let stop = StopSignal::new();
        let mut pipeline = pipeline.with_stop_signal(stop.clone());
        stop.raise();

        let err = pipeline
            .run("https://youtu.be/dQw4w9WgXcQ", SummaryStyle::Basic)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.0.lock().unwrap()[0].status, telemetry::UsageStatus::Cancelled);
    }
}

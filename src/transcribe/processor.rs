use anyhow::{Context, Result};
use aws_sdk_transcribe::types::{TranscriptionJob, TranscriptionJobStatus};
use aws_sdk_transcribe::Client as TranscribeClient;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::time::sleep;

use super::SpeechTranscript;
use crate::transcript::TranscriptSegment;

const TRANSCRIPT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// AWS Transcribe transcript format
#[derive(Debug, Deserialize)]
struct AwsTranscript {
    results: TranscriptResults,
}

#[derive(Debug, Deserialize)]
struct TranscriptResults {
    #[serde(default)]
    items: Vec<TranscriptItem>,
}

#[derive(Debug, Deserialize)]
struct TranscriptItem {
    start_time: Option<String>,
    end_time: Option<String>,
    #[serde(rename = "type")]
    item_type: String,
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    content: String,
}

/// Polls a transcription job and groups its words into segments
pub struct TranscriptionProcessor {
    client: TranscribeClient,
    job_name: String,
    max_segment_length: f64,
}

impl TranscriptionProcessor {
    pub fn new(client: TranscribeClient, job_name: String, max_segment_length: f64) -> Self {
        Self {
            client,
            job_name,
            max_segment_length,
        }
    }

    /// Wait for transcription job completion
    pub async fn wait_for_completion(&self) -> Result<SpeechTranscript> {
        let start_time = Instant::now();
        let mut check_count = 0u64;

        let job = loop {
            check_count += 1;
            let job = self.get_transcription_job().await?;

            match job.transcription_job_status() {
                Some(TranscriptionJobStatus::Completed) => break job,
                Some(TranscriptionJobStatus::Failed) => {
                    let failure_reason = job.failure_reason().unwrap_or("Unknown error");
                    anyhow::bail!("Transcription job failed: {}", failure_reason);
                }
                Some(TranscriptionJobStatus::InProgress | TranscriptionJobStatus::Queued) => {
                    tracing::debug!(
                        "Transcription job {} running ({}s elapsed, check #{})",
                        self.job_name,
                        start_time.elapsed().as_secs(),
                        check_count
                    );
                    // Back off up to 30 seconds between checks
                    let wait_time = std::cmp::min(5 + (check_count - 1) * 2, 30);
                    sleep(Duration::from_secs(wait_time)).await;
                }
                other => anyhow::bail!("Unexpected transcription job status: {:?}", other),
            }
        };

        tracing::info!(
            "Transcription job {} completed in {}s",
            self.job_name,
            start_time.elapsed().as_secs()
        );

        let transcript_uri = job
            .transcript()
            .and_then(|t| t.transcript_file_uri())
            .ok_or_else(|| anyhow::anyhow!("No transcript URI found"))?;

        let transcript_json = download_transcript(transcript_uri).await?;
        let parsed: AwsTranscript =
            serde_json::from_str(&transcript_json).context("Failed to parse transcript JSON")?;

        Ok(SpeechTranscript {
            segments: group_segments(&parsed.results.items, self.max_segment_length),
            language: job.language_code().map(|lc| lc.as_str().to_string()),
        })
    }

    async fn get_transcription_job(&self) -> Result<TranscriptionJob> {
        let response = self
            .client
            .get_transcription_job()
            .transcription_job_name(&self.job_name)
            .send()
            .await
            .context("Failed to get transcription job status")?;

        response
            .transcription_job()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Transcription job not found"))
    }
}

async fn download_transcript(uri: &str) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(TRANSCRIPT_DOWNLOAD_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let response = client
        .get(uri)
        .send()
        .await
        .context("Failed to download transcript")?;

    if !response.status().is_success() {
        anyhow::bail!("Failed to download transcript: HTTP {}", response.status());
    }

    response
        .text()
        .await
        .context("Failed to read transcript content")
}

/// Group word items into segments.
///
/// A new segment starts after a pause of more than a second, when the
/// current one exceeds `max_segment_length` seconds, or at a sentence end
/// once it is at least half that long.
fn group_segments(items: &[TranscriptItem], max_segment_length: f64) -> Vec<TranscriptSegment> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut segment_start: Option<f64> = None;
    let mut last_end: Option<f64> = None;
    let mut sentence_ended = false;

    for item in items {
        let Some(content) = item.alternatives.first().map(|alt| alt.content.as_str()) else {
            continue;
        };

        match item.item_type.as_str() {
            "pronunciation" => {
                let start = item.start_time.as_deref().and_then(|s| s.parse::<f64>().ok());
                let end = item.end_time.as_deref().and_then(|s| s.parse::<f64>().ok());

                let elapsed = segment_start.zip(start).map(|(seg, now)| now - seg);
                let pause = start.zip(last_end).map(|(now, prev)| now - prev > 1.0);
                let should_split = !text.is_empty()
                    && (pause.unwrap_or(false)
                        || elapsed.map(|e| e > max_segment_length).unwrap_or(false)
                        || (sentence_ended
                            && elapsed.map(|e| e > max_segment_length / 2.0).unwrap_or(false)));

                if should_split {
                    if let Some(seg_start) = segment_start {
                        segments.push(TranscriptSegment::new(seg_start, text.trim()));
                    }
                    text.clear();
                    segment_start = None;
                }

                if text.is_empty() {
                    segment_start = start;
                } else {
                    text.push(' ');
                }
                text.push_str(content);
                last_end = end.or(last_end);
                sentence_ended = false;
            }
            "punctuation" => {
                text.push_str(content);
                sentence_ended = matches!(content, "." | "!" | "?");
            }
            _ => {}
        }
    }

    if let Some(seg_start) = segment_start {
        if !text.trim().is_empty() {
            segments.push(TranscriptSegment::new(seg_start, text.trim()));
        }
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(json: &str) -> Vec<TranscriptItem> {
        let parsed: AwsTranscript = serde_json::from_str(json).unwrap();
        parsed.results.items
    }

    fn word(start: f64, end: f64, content: &str) -> String {
        format!(
            r#"{{"start_time":"{}","end_time":"{}","type":"pronunciation","alternatives":[{{"confidence":"0.99","content":"{}"}}]}}"#,
            start, end, content
        )
    }

    fn punct(content: &str) -> String {
        format!(
            r#"{{"type":"punctuation","alternatives":[{{"confidence":"0.0","content":"{}"}}]}}"#,
            content
        )
    }

    fn transcript(parts: &[String]) -> String {
        format!(
            r#"{{"jobName":"j","accountId":"1","status":"COMPLETED","results":{{"transcripts":[{{"transcript":"x"}}],"items":[{}]}}}}"#,
            parts.join(",")
        )
    }

    #[test]
    fn test_groups_on_pause() {
        let json = transcript(&[
            word(0.0, 0.4, "Hello"),
            word(0.5, 0.9, "world"),
            punct("."),
            word(3.0, 3.4, "Next"),
            word(3.5, 3.9, "part"),
        ]);
        let segments = group_segments(&items(&json), 10.0);
        assert_eq!(
            segments,
            vec![
                TranscriptSegment::new(0.0, "Hello world."),
                TranscriptSegment::new(3.0, "Next part"),
            ]
        );
    }

    #[test]
    fn test_splits_long_segments() {
        let parts: Vec<String> = (0..12)
            .map(|i| word(i as f64, i as f64 + 0.9, "word"))
            .collect();
        let segments = group_segments(&items(&transcript(&parts)), 5.0);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].start_time, 6.0);
    }

    #[test]
    fn test_sentence_end_splits_after_half_length() {
        let json = transcript(&[
            word(0.0, 0.9, "One"),
            word(1.0, 1.9, "two"),
            word(2.0, 2.9, "three"),
            punct("."),
            word(3.0, 3.5, "Four"),
        ]);
        let segments = group_segments(&items(&json), 4.0);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "One two three.");
        assert_eq!(segments[1].text, "Four");
    }

    #[test]
    fn test_empty_items() {
        assert!(group_segments(&items(&transcript(&[])), 10.0).is_empty());
    }
}

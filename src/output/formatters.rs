use anyhow::{Context, Result};
use serde::Serialize;

use crate::pipeline::SummaryResult;
use crate::transcript::{format_timestamp, Transcript, TranscriptSegment};
use crate::utils::format_duration;

/// Everything produced for one URL
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub url: &'a str,

    pub summaries: &'a [SummaryResult],

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<&'a Transcript>,
}

/// A run of segments ending at a sentence boundary
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptBlock {
    pub start_time: f64,
    pub text: String,
}

/// Group segments into sentence blocks.
///
/// A block closes after a segment ending in `.`, `?` or `!`, and at the last
/// segment; it carries the start time of its first segment.
pub fn sentence_blocks(segments: &[TranscriptSegment]) -> Vec<TranscriptBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<TranscriptBlock> = None;

    for seg in segments {
        let block = current.get_or_insert_with(|| TranscriptBlock {
            start_time: seg.start_time,
            text: String::new(),
        });
        if !block.text.is_empty() {
            block.text.push(' ');
        }
        block.text.push_str(&seg.text);

        if seg.text.ends_with(['.', '?', '!']) {
            blocks.extend(current.take());
        }
    }

    blocks.extend(current);
    blocks
}

fn transcript_lines(transcript: &Transcript, marker: impl Fn(&str) -> String) -> String {
    sentence_blocks(transcript.segments())
        .iter()
        .map(|b| format!("{} {}", marker(&format_timestamp(b.start_time)), b.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn result_caption(result: &SummaryResult) -> String {
    let source = if result.from_cache {
        format!("{}, cached", result.acquisition_method)
    } else {
        result.acquisition_method.to_string()
    };
    format!("{} from {}, ~{} tokens", result.style, source, result.token_count_estimate)
}

/// Plain text
pub fn format_as_text(report: &Report) -> String {
    let mut out = String::new();
    out.push_str(&format!("Video: {}\n", report.url));

    for result in report.summaries {
        let heading = format!("Summary ({})", result_caption(result));
        out.push_str(&format!("\n{}\n{}\n{}\n", heading, "=".repeat(heading.len()), result.final_summary));

        if let Some(parts) = &result.chunk_summaries {
            for (i, part) in parts.iter().enumerate() {
                out.push_str(&format!("\nPart {}:\n{}\n", i + 1, part));
            }
        }
    }

    if let Some(transcript) = report.transcript {
        let heading = format!("Transcript ({})", format_duration(transcript.last_offset()));
        out.push_str(&format!(
            "\n{}\n{}\n{}\n",
            heading,
            "=".repeat(heading.len()),
            transcript_lines(transcript, |ts| format!("[{}]", ts))
        ));
    }

    out
}

/// Markdown document
pub fn format_as_markdown(report: &Report) -> String {
    let mut out = format!("# Summary of <{}>\n", report.url);

    for result in report.summaries {
        out.push_str(&format!(
            "\n## {}\n\n_{}_\n\n{}\n",
            capitalize(result.style.as_str()),
            result_caption(result),
            result.final_summary
        ));

        if let Some(parts) = &result.chunk_summaries {
            out.push_str("\n### Part summaries\n");
            for (i, part) in parts.iter().enumerate() {
                out.push_str(&format!("\n#### Part {}\n\n{}\n", i + 1, part));
            }
        }
    }

    if let Some(transcript) = report.transcript {
        out.push_str(&format!(
            "\n## Transcript\n\n{}\n",
            transcript_lines(transcript, |ts| format!("**[{}]**", ts))
        ));
    }

    out
}

/// Pretty-printed JSON
pub fn format_as_json(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize summary")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

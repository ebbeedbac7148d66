use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Individual transcript segment with timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds from the beginning of the video
    pub start_time: f64,

    /// Segment text
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start_time: f64, text: impl Into<String>) -> Self {
        Self {
            start_time,
            text: text.into(),
        }
    }
}

/// How a transcript was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionMethod {
    Captions,
    SpeechToText,
}

impl AcquisitionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcquisitionMethod::Captions => "captions",
            AcquisitionMethod::SpeechToText => "speech_to_text",
        }
    }
}

impl fmt::Display for AcquisitionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete, time-aligned transcript.
///
/// Segments are normalized on construction (inner whitespace collapsed, empty
/// segments dropped), so `full_text` is always the segment texts joined by a
/// single space and there is at least one segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    full_text: String,
    segments: Vec<TranscriptSegment>,
    method: AcquisitionMethod,
    language: Option<String>,
}

impl Transcript {
    /// Build a transcript from raw segments. Returns `None` when no segment
    /// carries any text.
    pub fn from_segments(
        segments: impl IntoIterator<Item = TranscriptSegment>,
        method: AcquisitionMethod,
    ) -> Option<Self> {
        let segments: Vec<TranscriptSegment> = segments
            .into_iter()
            .filter_map(|seg| {
                let text = seg.text.split_whitespace().collect::<Vec<_>>().join(" ");
                (!text.is_empty()).then(|| TranscriptSegment::new(seg.start_time, text))
            })
            .collect();

        if segments.is_empty() {
            return None;
        }

        Some(Self {
            full_text: join_segments(&segments),
            segments,
            method,
            language: None,
        })
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    pub fn method(&self) -> AcquisitionMethod {
        self.method
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn word_count(&self) -> usize {
        self.full_text.split_whitespace().count()
    }

    /// Duration covered by the transcript, measured to the last segment start
    pub fn last_offset(&self) -> f64 {
        self.segments.last().map(|s| s.start_time).unwrap_or(0.0)
    }

    /// The whole transcript as a summarizable passage
    pub fn as_passage(&self) -> Passage {
        Passage {
            text: self.full_text.clone(),
            segments: self.segments.clone(),
        }
    }

    /// A passage covering the words `words` of `full_text` (by whitespace
    /// word index). Segments straddling the range are cut to the words that
    /// fall inside it and keep their original start time.
    pub fn passage(&self, words: Range<usize>) -> Passage {
        let mut segments = Vec::new();
        let mut offset = 0;

        for seg in &self.segments {
            if offset >= words.end {
                break;
            }
            let seg_words: Vec<&str> = seg.text.split_whitespace().collect();
            let seg_start = offset;
            offset += seg_words.len();

            let lo = seg_start.max(words.start);
            let hi = offset.min(words.end);
            if lo < hi {
                segments.push(TranscriptSegment::new(
                    seg.start_time,
                    seg_words[lo - seg_start..hi - seg_start].join(" "),
                ));
            }
        }

        Passage {
            text: join_segments(&segments),
            segments,
        }
    }
}

/// Text handed to the summarizer, with the segments it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
}

impl Passage {
    /// One `[m:ss] text` line per segment
    pub fn timestamped_lines(&self) -> String {
        self.segments
            .iter()
            .map(|seg| format!("[{}] {}", format_timestamp(seg.start_time), seg.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Join segment texts with single spaces
pub fn join_segments(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format seconds as `m:ss` (minutes are not padded)
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use url::Url;

use super::CaptionSource;
use crate::error::{PipelineError, Result};
use crate::transcript::TranscriptSegment;
use crate::utils;

/// A caption track selected for a video
#[derive(Debug, Clone)]
pub struct CaptionTrack {
    /// Language code of the track as reported by YouTube
    pub language: String,

    /// Whether the track was generated by automatic speech recognition
    pub automatic: bool,

    pub segments: Vec<TranscriptSegment>,
}

/// Resolve the video id of a YouTube URL.
///
/// Supports `youtube.com/watch?v=<id>`, `youtu.be/<id>` and the
/// `/shorts/`, `/embed/`, `/live/` and `/v/` path forms.
pub fn youtube_video_id(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let candidate = if host == "youtu.be" {
        url.path_segments()?.next().map(str::to_string)
    } else if host == "youtube.com" || host.ends_with(".youtube.com") {
        if url.path() == "/watch" {
            url.query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned())
        } else {
            let mut segments = url.path_segments()?;
            match (segments.next(), segments.next()) {
                (Some("shorts" | "embed" | "live" | "v"), Some(id)) => Some(id.to_string()),
                _ => None,
            }
        }
    } else {
        None
    };

    candidate
        .map(|id| id.trim().to_string())
        .filter(|id| is_video_id(id))
}

fn is_video_id(id: &str) -> bool {
    id.len() == 11
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Caption source using yt-dlp metadata and the WebVTT track URLs it reports
pub struct YtDlpCaptions {
    yt_dlp_path: String,
    client: Client,
}

impl YtDlpCaptions {
    pub fn new(yt_dlp_path: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            yt_dlp_path: yt_dlp_path.to_string(),
            client,
        })
    }

    /// Get video information using yt-dlp
    async fn get_video_info(&self, video_id: &str) -> anyhow::Result<Value> {
        let url = format!("https://www.youtube.com/watch?v={}", video_id);
        tracing::debug!("Extracting video info for: {}", url);

        let output = Command::new(&self.yt_dlp_path)
            .args(["--dump-json", "--skip-download", "--no-playlist", "--no-warnings"])
            .arg(&url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .context("Failed to run yt-dlp")?;

        if !output.status.success() {
            anyhow::bail!("yt-dlp failed: {}", utils::stderr_tail(&output.stderr, 3));
        }

        serde_json::from_slice(&output.stdout).context("Failed to parse yt-dlp metadata")
    }

    async fn download_vtt(&self, url: &str) -> anyhow::Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to download captions")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to download captions: HTTP {}", response.status());
        }

        response.text().await.context("Failed to read captions")
    }
}

#[async_trait]
impl CaptionSource for YtDlpCaptions {
    async fn fetch_captions(
        &self,
        video_id: &str,
        preferred_langs: &[String],
    ) -> Result<CaptionTrack> {
        let unavailable = |reason: String| PipelineError::NoCaptionsAvailable {
            video_id: video_id.to_string(),
            reason,
        };

        let info = self
            .get_video_info(video_id)
            .await
            .map_err(|e| unavailable(format!("{:#}", e)))?;

        let choice = select_track(&info, preferred_langs)
            .ok_or_else(|| unavailable("video has no caption tracks".to_string()))?;

        tracing::info!(
            "Using {} captions in {}",
            if choice.automatic { "automatic" } else { "manual" },
            choice.language
        );

        let vtt = self
            .download_vtt(&choice.url)
            .await
            .map_err(|e| unavailable(format!("{:#}", e)))?;

        Ok(CaptionTrack {
            language: choice.language,
            automatic: choice.automatic,
            segments: parse_vtt(&vtt, choice.automatic),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct TrackChoice {
    language: String,
    url: String,
    automatic: bool,
}

/// Pick a caption track from yt-dlp metadata.
///
/// Order: preferred languages (manual, then automatic), any English track
/// (manual, then automatic), any manual track, the automatic
/// original-language track, then any automatic track.
fn select_track(info: &Value, preferred: &[String]) -> Option<TrackChoice> {
    let empty = Map::new();
    let manual = info["subtitles"].as_object().unwrap_or(&empty);
    let automatic = info["automatic_captions"].as_object().unwrap_or(&empty);

    let english = |code: &str| code == "en" || code.starts_with("en-");
    let original = |code: &str| code.ends_with("-orig");
    let any = |_: &str| true;

    for lang in preferred {
        if let Some(choice) = find_vtt(manual, |code| code.eq_ignore_ascii_case(lang), false) {
            return Some(choice);
        }
    }
    for lang in preferred {
        if let Some(choice) = find_vtt(automatic, |code| code.eq_ignore_ascii_case(lang), true) {
            return Some(choice);
        }
    }

    find_vtt(manual, english, false)
        .or_else(|| find_vtt(automatic, english, true))
        .or_else(|| find_vtt(manual, any, false))
        .or_else(|| find_vtt(automatic, original, true))
        .or_else(|| find_vtt(automatic, any, true))
}

fn find_vtt<F>(tracks: &Map<String, Value>, matches: F, automatic: bool) -> Option<TrackChoice>
where
    F: Fn(&str) -> bool,
{
    tracks
        .iter()
        .filter(|(code, _)| code.as_str() != "live_chat" && matches(code))
        .find_map(|(code, formats)| {
            formats
                .as_array()?
                .iter()
                .filter(|format| format["ext"].as_str() == Some("vtt"))
                .find_map(|format| format["url"].as_str())
                .map(|url| TrackChoice {
                    language: code.clone(),
                    url: url.to_string(),
                    automatic,
                })
        })
}

/// Parse WebVTT into segments.
///
/// Inline tags and entities are stripped. Automatic captions repeat the
/// previous cue's line at the top of the next cue, so for `automatic`
/// tracks lines equal to the last emitted line are skipped. Manual tracks
/// keep every line.
pub fn parse_vtt(vtt: &str, automatic: bool) -> Vec<TranscriptSegment> {
    let mut segments = Vec::new();
    let mut last_line = String::new();

    let normalized = vtt.replace("\r\n", "\n");
    for block in normalized.split("\n\n") {
        let mut lines = block.lines().skip_while(|l| !l.contains("-->"));
        let Some(timing) = lines.next() else {
            continue;
        };
        let Some(start) = timing.split("-->").next().and_then(parse_vtt_timestamp) else {
            continue;
        };

        let mut cue_text = Vec::new();
        for line in lines {
            let line = clean_cue_line(line);
            if line.is_empty() || (automatic && line == last_line) {
                continue;
            }
            last_line = line.clone();
            cue_text.push(line);
        }

        if !cue_text.is_empty() {
            segments.push(TranscriptSegment::new(start, cue_text.join(" ")));
        }
    }

    segments
}

/// Parse `hh:mm:ss.mmm` or `mm:ss.mmm` into seconds
fn parse_vtt_timestamp(raw: &str) -> Option<f64> {
    let raw = raw.trim().replace(',', ".");
    let parts: Vec<&str> = raw.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (h.parse::<f64>().ok()?, m.parse::<f64>().ok()?, s.parse::<f64>().ok()?),
        [m, s] => (0.0, m.parse::<f64>().ok()?, s.parse::<f64>().ok()?),
        _ => return None,
    };
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

fn clean_cue_line(line: &str) -> String {
    let mut text = String::with_capacity(line.len());
    let mut in_tag = false;
    for c in line.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

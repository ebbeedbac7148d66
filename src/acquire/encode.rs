use anyhow::Context;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::AudioEncoder;
use crate::config::TranscriptionConfig;
use crate::utils;

/// Target format for audio handed to speech-to-text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeProfile {
    pub sample_rate: u32,
    pub channels: u8,
    pub bitrate: Option<String>,
}

impl Default for EncodeProfile {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            bitrate: Some("32k".to_string()),
        }
    }
}

impl EncodeProfile {
    pub fn from_config(config: &TranscriptionConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
            bitrate: config.bitrate.clone(),
        }
    }
}

/// Re-encodes audio with ffmpeg
pub struct FfmpegEncoder {
    ffmpeg_path: String,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg_path: &str) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.to_string(),
        }
    }

    fn command_args(input: &Path, output: &Path, profile: &EncodeProfile) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            input.to_string_lossy().into_owned(),
            "-vn".to_string(),
            "-ac".to_string(),
            profile.channels.to_string(),
            "-ar".to_string(),
            profile.sample_rate.to_string(),
        ];
        if let Some(bitrate) = &profile.bitrate {
            args.push("-b:a".to_string());
            args.push(bitrate.clone());
        }
        args.push(output.to_string_lossy().into_owned());
        args
    }
}

#[async_trait]
impl AudioEncoder for FfmpegEncoder {
    async fn reencode(
        &self,
        input: &Path,
        output: &Path,
        profile: &EncodeProfile,
    ) -> anyhow::Result<()> {
        tracing::debug!(
            "Re-encoding {} to {} Hz, {} channel(s)",
            input.display(),
            profile.sample_rate,
            profile.channels
        );

        let result = Command::new(&self.ffmpeg_path)
            .args(Self::command_args(input, output, profile))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .context("Failed to run ffmpeg")?;

        if !result.status.success() {
            anyhow::bail!("ffmpeg failed: {}", utils::stderr_tail(&result.stderr, 3));
        }

        let written = fs_err::metadata(output).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            anyhow::bail!("ffmpeg produced an empty file");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_args() {
        let args = FfmpegEncoder::command_args(
            Path::new("in.webm"),
            Path::new("out.mp3"),
            &EncodeProfile::default(),
        );
        let joined = args.join(" ");
        assert!(joined.starts_with("-y "));
        assert!(joined.contains("-i in.webm -vn -ac 1 -ar 16000 -b:a 32k"));
        assert_eq!(args.last().map(String::as_str), Some("out.mp3"));
    }

    #[test]
    fn test_without_bitrate() {
        let profile = EncodeProfile {
            bitrate: None,
            ..EncodeProfile::default()
        };
        let args = FfmpegEncoder::command_args(Path::new("a.m4a"), Path::new("b.mp3"), &profile);
        assert!(!args.contains(&"-b:a".to_string()));
    }

    #[test]
    fn test_profile_from_config() {
        let mut config = TranscriptionConfig::default();
        config.sample_rate = 22050;
        config.channels = 2;
        let profile = EncodeProfile::from_config(&config);
        assert_eq!(profile.sample_rate, 22050);
        assert_eq!(profile.channels, 2);
        assert_eq!(profile.bitrate.as_deref(), Some("32k"));
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("audio.mp3");
        fs_err::write(&input, b"not really audio").unwrap();

        let encoder = FfmpegEncoder::new("/nonexistent/ffmpeg-binary");
        let result = encoder
            .reencode(&input, &dir.path().join("out.mp3"), &EncodeProfile::default())
            .await;
        assert!(result.is_err());
    }
}

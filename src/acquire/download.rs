use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{AudioDownloader, AudioFormat};
use crate::utils;

const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1";

/// One way of asking yt-dlp for the audio stream.
///
/// Strategies differ in the YouTube player client they impersonate, the
/// HTTP user agent and network options; some videos only download with a
/// particular combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadStrategy {
    pub name: String,

    /// Value for `--extractor-args youtube:player_client=<client>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_client: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    #[serde(default)]
    pub force_ipv4: bool,

    /// Additional raw yt-dlp arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_args: Vec<String>,
}

impl DownloadStrategy {
    /// A strategy with yt-dlp defaults
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            player_client: None,
            user_agent: None,
            force_ipv4: false,
            extra_args: Vec::new(),
        }
    }

    fn client(mut self, client: &str) -> Self {
        self.player_client = Some(client.to_string());
        self
    }

    fn user_agent(mut self, agent: &str) -> Self {
        self.user_agent = Some(agent.to_string());
        self
    }

    fn ipv4(mut self) -> Self {
        self.force_ipv4 = true;
        self
    }

    fn extra(mut self, args: &[&str]) -> Self {
        self.extra_args.extend(args.iter().map(|a| a.to_string()));
        self
    }

    /// yt-dlp arguments contributed by this strategy
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(client) = &self.player_client {
            args.push("--extractor-args".to_string());
            args.push(format!("youtube:player_client={}", client));
        }
        if let Some(agent) = &self.user_agent {
            args.push("--user-agent".to_string());
            args.push(agent.clone());
        }
        if self.force_ipv4 {
            args.push("--force-ipv4".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// The eight built-in strategies, in the order they are attempted
pub fn default_strategies() -> Vec<DownloadStrategy> {
    vec![
        DownloadStrategy::named("default"),
        DownloadStrategy::named("android").client("android"),
        DownloadStrategy::named("ios").client("ios"),
        DownloadStrategy::named("web-browser")
            .client("web")
            .user_agent(CHROME_USER_AGENT),
        DownloadStrategy::named("tv-embedded").client("tv_embedded"),
        DownloadStrategy::named("mobile-web")
            .client("mweb")
            .user_agent(MOBILE_USER_AGENT),
        DownloadStrategy::named("web-ipv4").client("web").ipv4(),
        DownloadStrategy::named("android-geo-bypass")
            .client("android")
            .ipv4()
            .extra(&["--geo-bypass"]),
    ]
}

/// Audio downloader using yt-dlp
pub struct YtDlpDownloader {
    yt_dlp_path: String,
}

impl YtDlpDownloader {
    pub fn new(yt_dlp_path: &str) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.to_string(),
        }
    }

    fn command_args(url: &str, strategy: &DownloadStrategy, dir: &Path) -> Vec<String> {
        let template = dir.join("audio.%(ext)s");
        let mut args: Vec<String> = [
            "--format",
            "bestaudio/best",
            "--extract-audio",
            "--audio-format",
            "mp3",
            "--no-playlist",
            "--concurrent-fragments",
            "4",
            "--newline",
            "--output",
        ]
        .iter()
        .map(|a| a.to_string())
        .collect();
        args.push(template.to_string_lossy().into_owned());
        args.extend(strategy.args());
        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl AudioDownloader for YtDlpDownloader {
    async fn download(
        &self,
        url: &str,
        strategy: &DownloadStrategy,
        dir: &Path,
    ) -> anyhow::Result<PathBuf> {
        // Partial output from an earlier strategy must not be mistaken for a result
        remove_previous_output(dir)?;

        let output = Command::new(&self.yt_dlp_path)
            .args(Self::command_args(url, strategy, dir))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .context("Failed to run yt-dlp")?;

        if !output.status.success() {
            anyhow::bail!("{}", utils::stderr_tail(&output.stderr, 3));
        }

        find_output(dir)?.context("yt-dlp finished but produced no audio file")
    }
}

fn audio_outputs(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in fs_err::read_dir(dir)? {
        let path = entry?.path();
        let is_audio_stem = path.file_stem().and_then(|s| s.to_str()) == Some("audio");
        if is_audio_stem && path.is_file() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

fn remove_previous_output(dir: &Path) -> anyhow::Result<()> {
    for path in audio_outputs(dir)? {
        fs_err::remove_file(&path)?;
    }
    Ok(())
}

/// Locate the finished `audio.<ext>` file, preferring mp3
fn find_output(dir: &Path) -> anyhow::Result<Option<PathBuf>> {
    let candidates: Vec<PathBuf> = audio_outputs(dir)?
        .into_iter()
        .filter(|p| AudioFormat::from_path(p).is_some())
        .collect();

    Ok(candidates
        .iter()
        .find(|p| AudioFormat::from_path(p) == Some(AudioFormat::Mp3))
        .or_else(|| candidates.first())
        .cloned())
}

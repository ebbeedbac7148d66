use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::acquire::download::{default_strategies, DownloadStrategy};

/// Environment variable that points at an explicit config file
pub const CONFIG_ENV: &str = "CLIPNOTES_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Language model settings
    pub generation: GenerationConfig,

    /// Speech-to-text settings
    pub transcription: TranscriptionConfig,

    /// Caption lookup and audio download settings
    pub acquisition: AcquisitionConfig,

    /// Usage reporting
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// OpenAI-compatible chat completions endpoint
    pub api_url: String,

    /// Model name sent with each request
    pub model: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Output cap per request; also reserved when deciding whether to chunk
    pub max_output_tokens: u32,

    /// Context window of the model
    pub context_limit: usize,

    /// Token threshold at which a chunk is closed
    pub chunk_token_threshold: usize,

    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SttBackend {
    Openai,
    Aws,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Which speech-to-text service to use
    pub backend: SttBackend,

    /// Whisper-compatible transcription endpoint
    pub api_url: String,

    pub model: String,

    pub api_key_env: String,

    /// Language hint (auto-detect if not specified)
    pub language: Option<String>,

    /// Sample rate for re-encoded audio
    pub sample_rate: u32,

    /// Channel count for re-encoded audio
    pub channels: u8,

    /// Optional bitrate for re-encoded audio, e.g. "32k"
    pub bitrate: Option<String>,

    pub request_timeout_secs: u64,

    /// AWS Transcribe settings (backend: aws)
    pub aws: AwsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// AWS region
    pub region: String,

    /// S3 bucket for temporary audio storage
    pub s3_bucket: String,

    /// Optional S3 key prefix
    pub s3_key_prefix: Option<String>,

    /// Maximum segment length in seconds when grouping words
    pub max_segment_length: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub yt_dlp_path: String,

    pub ffmpeg_path: String,

    /// Preferred caption languages, most preferred first
    pub caption_languages: Vec<String>,

    pub caption_timeout_secs: u64,

    /// Timeout for a single download strategy
    pub download_timeout_secs: u64,

    pub encode_timeout_secs: u64,

    /// Timeout for the whole speech-to-text step, including AWS job polling
    pub transcription_timeout_secs: u64,

    /// Parent directory for scratch files (system temp dir if not specified)
    pub temp_dir: Option<PathBuf>,

    /// Download strategies, tried in order
    pub strategies: Vec<DownloadStrategy>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Webhook receiving usage events (disabled if not specified)
    pub webhook_url: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_output_tokens: 900,
            context_limit: 8192,
            chunk_token_threshold: 3000,
            request_timeout_secs: 120,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            backend: SttBackend::Openai,
            api_url: "https://api.openai.com/v1/audio/transcriptions".to_string(),
            model: "whisper-1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            language: None,
            sample_rate: 16000,
            channels: 1,
            bitrate: Some("32k".to_string()),
            request_timeout_secs: 600,
            aws: AwsConfig::default(),
        }
    }
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            s3_bucket: "".to_string(),
            s3_key_prefix: Some("clipnotes/".to_string()),
            max_segment_length: 10.0,
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            caption_languages: vec!["en".to_string(), "en-US".to_string(), "en-GB".to_string()],
            caption_timeout_secs: 60,
            download_timeout_secs: 300,
            encode_timeout_secs: 300,
            transcription_timeout_secs: 1800,
            temp_dir: None,
            strategies: default_strategies(),
        }
    }
}

impl AcquisitionConfig {
    pub fn caption_timeout(&self) -> Duration {
        Duration::from_secs(self.caption_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn encode_timeout(&self) -> Duration {
        Duration::from_secs(self.encode_timeout_secs)
    }

    pub fn transcription_timeout(&self) -> Duration {
        Duration::from_secs(self.transcription_timeout_secs)
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults
    pub fn load() -> Result<Self> {
        match Self::config_path()? {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load and validate a specific configuration file
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        let config: Config =
            serde_yaml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save configuration to the user config directory, returning the path
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::user_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(config_path)
    }

    /// First existing config file: `$CLIPNOTES_CONFIG`, `./clipnotes.yaml`,
    /// then the user config directory
    fn config_path() -> Result<Option<PathBuf>> {
        if let Ok(explicit) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(explicit);
            if !path.exists() {
                anyhow::bail!("{} points at a missing file: {}", CONFIG_ENV, path.display());
            }
            return Ok(Some(path));
        }

        let local_config = PathBuf::from("clipnotes.yaml");
        if local_config.exists() {
            return Ok(Some(local_config));
        }

        let user_config = Self::user_config_path()?;
        Ok(user_config.exists().then_some(user_config))
    }

    /// Where `save` writes: `<config_dir>/clipnotes/config.yaml`
    pub fn user_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("clipnotes").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let generation = &self.generation;
        if generation.chunk_token_threshold == 0 {
            anyhow::bail!("generation.chunk_token_threshold must be greater than zero");
        }
        if generation.context_limit <= generation.max_output_tokens as usize {
            anyhow::bail!(
                "generation.context_limit ({}) must exceed generation.max_output_tokens ({})",
                generation.context_limit,
                generation.max_output_tokens
            );
        }
        if self.acquisition.strategies.is_empty() {
            anyhow::bail!("acquisition.strategies must list at least one download strategy");
        }
        if self.transcription.backend == SttBackend::Aws
            && self.transcription.aws.s3_bucket.is_empty()
        {
            anyhow::bail!("transcription.aws.s3_bucket must be configured for the aws backend");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Model: {} ({})", self.generation.model, self.generation.api_url);
        println!(
            "  Token budget: context {}, output {}, chunk threshold {}",
            self.generation.context_limit,
            self.generation.max_output_tokens,
            self.generation.chunk_token_threshold
        );
        match self.transcription.backend {
            SttBackend::Openai => {
                println!("  Transcription: {} ({})", self.transcription.model, self.transcription.api_url)
            }
            SttBackend::Aws => println!(
                "  Transcription: AWS Transcribe, region {}, bucket {}",
                self.transcription.aws.region, self.transcription.aws.s3_bucket
            ),
        }
        println!("  Caption languages: {}", self.acquisition.caption_languages.join(", "));
        println!(
            "  Download strategies: {}",
            self.acquisition
                .strategies
                .iter()
                .map(|s| s.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        match &self.telemetry.webhook_url {
            Some(url) => println!("  Telemetry: {}", url),
            None => println!("  Telemetry: disabled"),
        }
    }
}

/// Read an API key from the environment
pub fn api_key(env_var: &str) -> Result<String> {
    std::env::var(env_var)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .with_context(|| format!("Missing API key: {} environment variable is not set", env_var))
}

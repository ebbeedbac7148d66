use std::fmt;

/// Failure categories a caller can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidUrl,
    NoCaptionsAvailable,
    DownloadFailed,
    CompressionFailed,
    TranscriptionError,
    GenerationError,
    Cancelled,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidUrl => "invalid_url",
            ErrorKind::NoCaptionsAvailable => "no_captions_available",
            ErrorKind::DownloadFailed => "download_failed",
            ErrorKind::CompressionFailed => "compression_failed",
            ErrorKind::TranscriptionError => "transcription_error",
            ErrorKind::GenerationError => "generation_error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Config => "config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error types surfaced by the summarization pipeline
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("Invalid video URL: {0}")]
    InvalidUrl(String),

    #[error("No captions available for video {video_id}: {reason}")]
    NoCaptionsAvailable { video_id: String, reason: String },

    #[error("Audio download failed after {attempts} strategies: {last_error}")]
    DownloadFailed { attempts: usize, last_error: String },

    #[error("Audio compression failed: {0}")]
    CompressionFailed(String),

    #[error("Transcription failed: {0}")]
    TranscriptionError(String),

    #[error("Summary generation failed: {0}")]
    GenerationError(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidUrl(_) => ErrorKind::InvalidUrl,
            PipelineError::NoCaptionsAvailable { .. } => ErrorKind::NoCaptionsAvailable,
            PipelineError::DownloadFailed { .. } => ErrorKind::DownloadFailed,
            PipelineError::CompressionFailed(_) => ErrorKind::CompressionFailed,
            PipelineError::TranscriptionError(_) => ErrorKind::TranscriptionError,
            PipelineError::GenerationError(_) => ErrorKind::GenerationError,
            PipelineError::Cancelled => ErrorKind::Cancelled,
            PipelineError::Config(_) => ErrorKind::Config,
        }
    }

    /// Short suggestion to show next to the error message
    pub fn remediation(&self) -> &'static str {
        match self.kind() {
            ErrorKind::InvalidUrl => {
                "Check the link; use a standard https://www.youtube.com/watch?v=... or https://youtu.be/... URL."
            }
            ErrorKind::NoCaptionsAvailable | ErrorKind::DownloadFailed => {
                "The video could not be retrieved. Try a different video, or update yt-dlp."
            }
            ErrorKind::CompressionFailed => "Check that ffmpeg is installed and on PATH.",
            ErrorKind::TranscriptionError => {
                "The speech-to-text service rejected the audio. Try again later or with a shorter video."
            }
            ErrorKind::GenerationError => {
                "The language model request failed. Check your API key and quota, then retry."
            }
            ErrorKind::Cancelled => "The run was stopped before it finished.",
            ErrorKind::Config => "Fix the configuration file (see `clipnotes config --show`).",
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

//! clipnotes - summarize YouTube videos with a language model
//!
//! Transcripts come from the video's captions when available, otherwise from
//! downloading the audio (trying several yt-dlp strategies) and running it
//! through a speech-to-text service. Transcripts that do not fit the model's
//! context are split into token-bounded chunks, summarized chunk by chunk and
//! condensed into one summary.

pub mod acquire;
pub mod chunker;
pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod summarize;
pub mod telemetry;
pub mod tokens;
pub mod transcribe;
pub mod transcript;
pub mod utils;

pub use acquire::{Acquirer, TranscriptSource};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use error::{ErrorKind, PipelineError, Result};
pub use pipeline::{Pipeline, PipelineSettings, RunOptions, StopSignal, SummaryResult};
pub use summarize::{Generator, Summarizer, SummaryStyle};
pub use telemetry::{UsageEvent, UsageSink, UsageStatus};
pub use transcript::{AcquisitionMethod, Transcript, TranscriptSegment};

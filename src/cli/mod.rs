use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::summarize::SummaryStyle;

#[derive(Parser)]
#[command(
    name = "clipnotes",
    about = "Summarize YouTube videos from captions or speech-to-text transcripts",
    version,
    long_about = "Fetches a video's captions (or downloads its audio and transcribes it when no captions exist) and asks a language model for a summary in one of several styles. Long transcripts are summarized in chunks and then condensed."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Summarize a video
    Summarize {
        /// Video URL (youtube.com/watch, youtu.be, shorts, embed, live)
        #[arg(value_name = "URL")]
        url: String,

        /// Summary style; repeat to produce several summaries from one transcript
        #[arg(short, long = "style", value_enum, default_value = "basic")]
        styles: Vec<SummaryStyle>,

        /// Always summarize in chunks, even when the transcript fits the model
        #[arg(long)]
        deep: bool,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Append the timestamped transcript
        #[arg(long)]
        show_transcript: bool,
    },

    /// Show or initialize configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List summary styles
    Styles,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// Markdown document
    Markdown,
    /// JSON with chunk summaries and metadata
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

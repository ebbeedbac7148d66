use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::transcript::Passage;

const TRANSCRIPT_SLOT: &str = "{transcript}";
const COMBINED_SLOT: &str = "{combined}";

/// Summary styles a caller can pick from
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStyle {
    /// Quick summary in 5-7 sentences
    Basic,
    /// List of 5-10 key points
    Bullets,
    /// 5-10 compelling lines, anchored to timestamps
    Quotes,
    /// Strategic takeaways with explanations
    Insights,
    /// Main points explained for someone new to the topic
    Newbie,
}

impl SummaryStyle {
    pub const ALL: [SummaryStyle; 5] = [
        SummaryStyle::Basic,
        SummaryStyle::Bullets,
        SummaryStyle::Quotes,
        SummaryStyle::Insights,
        SummaryStyle::Newbie,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryStyle::Basic => "basic",
            SummaryStyle::Bullets => "bullets",
            SummaryStyle::Quotes => "quotes",
            SummaryStyle::Insights => "insights",
            SummaryStyle::Newbie => "newbie",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SummaryStyle::Basic => "quick summary in 5-7 sentences",
            SummaryStyle::Bullets => "list of 5-10 key points",
            SummaryStyle::Quotes => "5-10 compelling lines with timestamps",
            SummaryStyle::Insights => "strategic takeaways with explanations",
            SummaryStyle::Newbie => "explain main points like I'm new to the topic",
        }
    }

    pub fn temperature(&self) -> f32 {
        match self {
            SummaryStyle::Basic | SummaryStyle::Bullets => 0.5,
            SummaryStyle::Quotes => 0.3,
            SummaryStyle::Insights | SummaryStyle::Newbie => 0.7,
        }
    }

    /// Whether the direct prompt is fed `[m:ss]`-prefixed segment lines
    pub fn uses_timestamps(&self) -> bool {
        matches!(self, SummaryStyle::Quotes)
    }

    fn direct_template(&self) -> &'static str {
        match self {
            SummaryStyle::Basic => {
                "Summarize the following transcript in 5-7 clear sentences.\n\n{transcript}"
            }
            SummaryStyle::Bullets => {
                "Distill the transcript below into 5-10 key bullet points. \
                 Avoid restating general ideas; capture only the essential, non-redundant takeaways \
                 that would be valuable for someone skimming for key points.\n\n{transcript}"
            }
            SummaryStyle::Quotes => {
                "Extract 5-10 of the most compelling or insightful quotes from this transcript. \
                 Every line below starts with a timestamp in [m:ss] format. \
                 Include the timestamp of the line each quote comes from, in the same [m:ss] format, \
                 before the quote.\n\n{transcript}"
            }
            SummaryStyle::Insights => {
                "Extract and explain 5-7 key lessons or strategic insights from the transcript below.\n\n\
                 Format each insight exactly like this:\n\n\
                 **Insight Title Goes Here**\n\n\
                 Insight explanation in 2-3 sentences.\n\n\
                 Use a double newline between the title and explanation, and between insights. \
                 Do not bold the explanation, only the title.\n\n{transcript}"
            }
            SummaryStyle::Newbie => {
                "Explain the 5-7 key ideas of the transcript below in simple terms, \
                 as if to someone who is new to the topic. Briefly define any jargon.\n\n{transcript}"
            }
        }
    }

    fn condense_template(&self) -> &'static str {
        match self {
            SummaryStyle::Basic => {
                "Summarize the following multi-part summary into a cohesive paragraph:\n\n{combined}"
            }
            SummaryStyle::Bullets => {
                "Summarize the following multi-part summaries into a single cohesive bullet-point list \
                 (maximum 10 bullets):\n\n{combined}"
            }
            SummaryStyle::Quotes => {
                "From the following quotes, select the 5-10 most compelling. \
                 Do not include timestamps; remove any that appear below and output only the quotes.\n\n{combined}"
            }
            SummaryStyle::Insights => {
                "Merge the following into 5-7 strategic insights. \
                 Keep the format: a bold title, a blank line, then a 2-3 sentence explanation.\n\n{combined}"
            }
            SummaryStyle::Newbie => {
                "Combine the following into one simple explanation for someone new to the topic:\n\n{combined}"
            }
        }
    }

    /// Prompt for summarizing one passage directly
    pub fn render_direct(&self, passage: &Passage) -> String {
        let body = if self.uses_timestamps() {
            passage.timestamped_lines()
        } else {
            passage.text.clone()
        };
        self.direct_template().replace(TRANSCRIPT_SLOT, &body)
    }

    /// Prompt for merging per-chunk summaries
    pub fn render_condense(&self, chunk_summaries: &[String]) -> String {
        self.condense_template()
            .replace(COMBINED_SLOT, &chunk_summaries.join("\n\n"))
    }
}

impl fmt::Display for SummaryStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

use anyhow::Result;
use std::path::Path;

use crate::cli::OutputFormat;

pub mod formatters;

pub use formatters::*;

/// Render a report in the requested format
pub fn render(report: &Report, format: &OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => format_as_text(report),
        OutputFormat::Markdown => format_as_markdown(report),
        OutputFormat::Json => format_as_json(report)?,
    })
}

/// Save a report to file
pub fn save_to_file(report: &Report, path: &Path, format: &OutputFormat) -> Result<()> {
    let content = render(report, format)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print a report to stdout
pub fn print_to_console(report: &Report, format: &OutputFormat) -> Result<()> {
    println!("{}", render(report, format)?);
    Ok(())
}

use anyhow::Result;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipnotes::cli::{Cli, Commands};
use clipnotes::config::Config;
use clipnotes::output::{self, Report};
use clipnotes::pipeline::{Pipeline, RunOptions, StopSignal};
use clipnotes::summarize::SummaryStyle;
use clipnotes::utils;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = Config::load()?;

    match cli.command {
        Commands::Summarize {
            url,
            styles,
            deep,
            output,
            format,
            show_transcript,
        } => {
            // Missing tools are reported but not fatal; the paths may still resolve at run time
            let missing_deps = utils::check_dependencies(
                &config.acquisition.yt_dlp_path,
                &config.acquisition.ffmpeg_path,
            )
            .await;
            if !missing_deps.is_empty() {
                eprintln!("{}", style("Dependency check warnings:").yellow());
                for dep in missing_deps {
                    eprintln!("   • {}", dep);
                }
            }

            let stop = StopSignal::new();
            let ctrl_c = stop.clone();
            tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    if ctrl_c.interrupt() {
                        eprintln!("{}", style("Interrupted again, exiting").red());
                        std::process::exit(130);
                    }
                    tracing::warn!(
                        "Interrupted, stopping at the next checkpoint (press Ctrl-C again to exit now)"
                    );
                }
            });

            let mut pipeline = Pipeline::from_config(&config, stop).await?;
            let progress = spinner(cli.quiet);

            tracing::info!("Starting summary for URL: {}", url);
            let mut results = Vec::with_capacity(styles.len());
            for summary_style in styles {
                progress.set_message(format!("Summarizing ({})...", summary_style));
                match pipeline
                    .run_with(&url, summary_style, RunOptions { deep })
                    .await
                {
                    Ok(result) => results.push(result),
                    Err(e) => {
                        progress.abandon_with_message("Failed");
                        eprintln!("{} {}", style("Error:").red().bold(), e);
                        eprintln!("{} {}", style("Hint:").cyan(), e.remediation());
                        std::process::exit(1);
                    }
                }
            }
            progress.finish_and_clear();

            let transcript = if show_transcript {
                pipeline.cached_transcript(&url)
            } else {
                None
            };
            let report = Report {
                url: &url,
                summaries: &results,
                transcript: transcript.as_deref(),
            };

            match output {
                Some(path) => {
                    output::save_to_file(&report, &path, &format)?;
                    println!("Summary saved to: {}", path.display());
                }
                None => output::print_to_console(&report, &format)?,
            }
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                let path = Config::user_config_path()?;
                if path.exists() {
                    println!("Config file: {}", path.display());
                } else {
                    let path = config.save()?;
                    println!("Wrote default configuration to: {}", path.display());
                }
                println!("Edit it to change models, timeouts or download strategies.");
            }
        }
        Commands::Styles => {
            println!("Summary styles:");
            for summary_style in SummaryStyle::ALL {
                println!("  • {:<9} {}", summary_style.as_str(), summary_style.description());
            }
        }
    }

    Ok(())
}

fn init_tracing(cli: &Cli) {
    let default_filter = if cli.verbose {
        "clipnotes=debug"
    } else {
        "clipnotes=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);

    if cli.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let progress = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        progress.set_style(template);
    }
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}

use anyhow::{bail, Context};
use clap::Parser;
use inquire::error::InquireResult;
use tracing_subscriber::EnvFilter;

mod app;
mod cache;
mod cli;
mod config;
mod fetch;
mod lock;
mod similarity;
#[cfg(test)]
mod tests;

use app::{App, AppError};
use cache::CacheRecord;
use config::Config;
use similarity::Comparison;

fn init_logging() {
    let filter = EnvFilter::try_from_env("SITESIM_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn prompt_url(value: Option<String>, message: &str) -> anyhow::Result<String> {
    if let Some(url) = value {
        return Ok(url);
    }

    match inquire::Text::new(message).prompt() {
        InquireResult::Ok(url) if !url.trim().is_empty() => Ok(url.trim().to_string()),
        InquireResult::Ok(_) => bail!("url must not be empty"),
        InquireResult::Err(err) => bail!("An error occurred: {}", err),
    }
}

/// Scores always print with a fractional part, so 0 and 1 read as `0.0` and `1.0`.
fn score_line(score: f64) -> String {
    format!("The similarity score is {score:?}")
}

fn print_comparison(comparison: &Comparison, details: bool, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(comparison)?);
        return Ok(());
    }

    if details {
        for channel in &comparison.channels {
            println!("  {:<12} {:.4}", channel.channel.name(), channel.score);
        }
    }
    println!("{}", score_line(comparison.score));
    Ok(())
}

fn print_records(records: &[CacheRecord], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }

    for record in records {
        let stale = if record.stale { " (stale)" } else { "" };
        println!("{:?} {} {}{stale}", record.score, record.url1, record.url2);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    init_logging();

    let base_path = Config::default_base_path()?;
    let config = Config::load_with(&base_path)
        .with_context(|| format!("failed to load config from {}", base_path.display()))?;
    let app = App::new(&config)?;

    match args.command {
        cli::Command::Compare {
            url1,
            url2,
            details,
            output,
        } => {
            let url1 = prompt_url(url1, "Enter the first URL:")?;
            let url2 = prompt_url(url2, "Enter the second URL:")?;

            match app.compare_similarity(&url1, &url2) {
                Ok(comparison) => print_comparison(&comparison, details, output.json),
                Err(AppError::CacheWrite { comparison, source }) => {
                    print_comparison(&comparison, details, output.json)?;
                    Err(source).context("score was not saved")
                }
                Err(err) => Err(err.into()),
            }
        }

        cli::Command::Show { pair, output } => {
            match app.cached(&pair.url1, &pair.url2)? {
                Some(record) => print_records(&[record], output.json)?,
                None => println!("No stored score for {} {}", pair.url1, pair.url2),
            }
            Ok(())
        }

        cli::Command::List { output } => print_records(&app.records()?, output.json),

        cli::Command::Stale { url1, url2, all } => {
            if all {
                let count = app.mark_all_stale()?;
                println!("{count} scores marked stale");
                return Ok(());
            }

            let (Some(url1), Some(url2)) = (url1, url2) else {
                bail!("expected two urls or --all");
            };

            if app.mark_stale(&url1, &url2)? {
                println!("Marked {url1} {url2} stale");
            } else {
                println!("No stored score for {url1} {url2}");
            }
            Ok(())
        }
    }
}

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use hefti::api::{EntryApi, HttpEntryApi};
use hefti::config;
use hefti::report::{format_hours, WeekReport};

#[derive(Debug, Parser)]
#[command(author, version, about = "Inspect the time-tracking entries held by the backend")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List every entry
    List,
    /// Summarize one ISO week by category
    Week {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        week: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let api = HttpEntryApi::from_config(&cfg)?;

    let mut records = api.list().await.context("failed to list entries")?;
    info!(count = records.len(), "fetched entries");

    match args.command {
        Command::List => {
            records.sort_by(|a, b| a.logdate.cmp(&b.logdate).then_with(|| a.id.as_str().cmp(b.id.as_str())));
            for r in &records {
                println!(
                    "{:>6}  {}  {:<24}  {:>6.2}h  {}",
                    r.id,
                    r.logdate,
                    r.entry_type.as_str(),
                    r.spend_time,
                    r.title
                );
            }
        }
        Command::Week { year, week } => {
            let report = WeekReport::build(year, week, &records)
                .ok_or_else(|| anyhow!("{} has no ISO week {}", year, week))?;
            println!("Week {} / {} ({} - {})", report.week, report.year, report.start, report.end);
            for (entry_type, category) in &report.categories {
                println!("\n{} ({})", entry_type, format_hours(category.hours));
                for r in &category.entries {
                    println!("  {}  {:<40}  {}", r.logdate, r.title, format_hours(r.spend_time));
                }
            }
            println!("\nTotal: {}", format_hours(report.total_hours));
        }
    }

    Ok(())
}

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use event_digest::app::ports::EventSourcePort;
use event_digest::app::DigestUseCase;
use event_digest::config::Config;
use event_digest::domain::Instant;
use event_digest::infra::{FileDigestOutputAdapter, JsonFileEventSource};
use event_digest::observability::{init_logging, init_metrics, render_metrics};
use event_digest::pipeline::processing::{DateExpressionParser, KeyStrategy};

#[derive(Parser)]
#[command(name = "event_digest")]
#[command(about = "Normalize, merge and bucket scraped event listings")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how date strings are interpreted
    Parse {
        /// Evaluation instant (YYYY-MM-DD or YYYY-MM-DD HH:MM:SS); defaults to now
        #[arg(long)]
        now: Option<String>,
        /// Date strings to parse
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Build a weekly digest from scraped JSON files
    Digest {
        /// Config file (defaults to event_digest.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Input JSON files; replaces the sources listed in the config
        #[arg(long)]
        input: Vec<PathBuf>,
        /// Output file; stdout if omitted and not configured
        #[arg(long)]
        output: Option<PathBuf>,
        /// Evaluation instant (YYYY-MM-DD or YYYY-MM-DD HH:MM:SS); defaults to now
        #[arg(long)]
        now: Option<String>,
        #[arg(long, value_enum)]
        key_strategy: Option<KeyStrategyArg>,
        /// Drop events whose last date has already passed
        #[arg(long)]
        drop_past: bool,
        /// Print Prometheus metrics to stderr when done
        #[arg(long)]
        print_metrics: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KeyStrategyArg {
    TitleOnly,
    TitleAndDescription,
}

impl From<KeyStrategyArg> for KeyStrategy {
    fn from(arg: KeyStrategyArg) -> Self {
        match arg {
            KeyStrategyArg::TitleOnly => KeyStrategy::TitleOnly,
            KeyStrategyArg::TitleAndDescription => KeyStrategy::TitleAndDescription,
        }
    }
}

fn parse_now(value: Option<&str>) -> Result<Instant> {
    let Some(value) = value else {
        return Ok(Local::now().naive_local());
    };
    let value = value.trim();
    if let Ok(instant) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(instant);
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid --now '{}': expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS", value))?;
    Ok(date.and_time(chrono::NaiveTime::MIN))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { now, text } => {
            let parser = DateExpressionParser::new(parse_now(now.as_deref())?);
            for input in &text {
                for line in parser.explain(input) {
                    println!("{}", line);
                }
                println!();
            }
        }
        Commands::Digest {
            config,
            input,
            output,
            now,
            key_strategy,
            drop_past,
            print_metrics,
        } => {
            init_metrics();
            let now = parse_now(now.as_deref())?;

            let mut config = Config::load(config.as_deref())?;
            if let Some(strategy) = key_strategy {
                config.merge.key_strategy = strategy.into();
            }
            if drop_past {
                config.digest.drop_past_events = true;
            }
            if output.is_some() {
                config.digest.output = output;
            }

            let sources: Vec<Arc<dyn EventSourcePort>> = if input.is_empty() {
                config
                    .sources
                    .iter()
                    .map(|s| Arc::new(JsonFileEventSource::new(s.id.clone(), s.path.clone())) as Arc<dyn EventSourcePort>)
                    .collect()
            } else {
                input
                    .into_iter()
                    .map(|path| Arc::new(JsonFileEventSource::from_path(path)) as Arc<dyn EventSourcePort>)
                    .collect()
            };
            if sources.is_empty() {
                anyhow::bail!("No sources: pass --input or list [[sources]] in the config");
            }

            let output_port = Arc::new(FileDigestOutputAdapter::new(config.digest.output.clone()));
            let use_case = DigestUseCase::new(sources, output_port, config);
            let summary = use_case.run(now).await?;

            info!("Digest run finished");
            eprintln!("\n📊 Digest Results:");
            eprintln!("   Records fetched: {}", summary.records_fetched);
            eprintln!("   Failed sources: {}", summary.failed_sources);
            eprintln!("   Merged events: {}", summary.merge.merged_events);
            eprintln!("   Dropped records: {}", summary.merge.dropped_records());
            eprintln!("   Dropped past events: {}", summary.dropped_past);
            eprintln!(
                "   This week: {} | Next week: {} | Upcoming: {}",
                summary.this_week, summary.next_week, summary.future
            );

            if print_metrics {
                match render_metrics() {
                    Some(text) => eprintln!("\n{}", text),
                    None => eprintln!("\n⚠️  Metrics recorder not installed"),
                }
            }
        }
    }

    Ok(())
}

//! León radar feed CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate};
use clap::{Parser, Subcommand};
use radar_feed::{
    error::Result,
    models::{Config, StreetMention},
    pipeline,
    services::{
        DayBlockParser, FeatureAssembler, OverpassBackend, SourceLocator, StreetResolver,
        extract_text,
    },
    storage::LocalStorage,
    utils::http::ResilientFetcher,
};

/// radar-feed - León mobile speed-radar GeoJSON builder
#[derive(Parser, Debug)]
#[command(
    name = "radar-feed",
    version,
    about = "Daily GeoJSON of León mobile speed-radar streets"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "radars/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline and write the feed
    Run {
        /// Day to build the feed for (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Override the output directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Find this month's bulletin and print its URL
    Discover {
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Print the streets listed for a day in a local bulletin PDF
    Parse {
        pdf: PathBuf,

        /// Day of month (default: today)
        #[arg(long)]
        day: Option<u32>,
    },

    /// Resolve one street name and print its GeoJSON feature
    Resolve { street: String },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load(&cli.config);
    let level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &level);

    let mut config = match loaded {
        Ok(config) => {
            log::info!("Loaded configuration from {}", cli.config.display());
            config
        }
        Err(e) => {
            log::warn!("Using default configuration ({}): {}", cli.config.display(), e);
            Config::default()
        }
    };

    let today = Local::now().date_naive();

    match cli.command {
        Command::Run { date, output_dir } => {
            if let Some(dir) = output_dir {
                config.output.output_dir = dir.to_string_lossy().into_owned();
            }
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                pipeline::write_empty_feed(&config.output).await?;
                return Err(e);
            }

            let summary = pipeline::run_feed(&config, date.unwrap_or(today)).await?;
            match &summary.bulletin {
                Some(url) => log::info!(
                    "Bulletin {}: {} street(s), {} mapped",
                    url,
                    summary.streets,
                    summary.features
                ),
                None => log::warn!("No bulletin processed; feed is empty"),
            }
        }

        Command::Discover { date } => {
            let web = Arc::new(ResilientFetcher::new(&config.http)?);
            let store = Arc::new(LocalStorage::from_config(&config.output));
            let locator = SourceLocator::from_config(&config, web, store);

            let reference = locator.locate(date.unwrap_or(today)).await?;
            println!("{}\t{}", reference.strategy, reference.url);
        }

        Command::Parse { pdf, day } => {
            let bytes = tokio::fs::read(&pdf).await?;
            let text = extract_text(&bytes)?;
            let parser = DayBlockParser::new(&config.parser)?;

            for street in parser.extract_streets(&text, day.unwrap_or(today.day()))? {
                println!("{street}");
            }
        }

        Command::Resolve { street } => {
            let fetcher = ResilientFetcher::new(&config.http)?;
            let backend = Arc::new(OverpassBackend::new(fetcher, &config.resolver));
            let resolver = StreetResolver::new(backend, &config.resolver);

            let road = resolver.resolve(&street).await;
            let mention = StreetMention {
                name: street.clone(),
                source_line: street,
            };
            match FeatureAssembler::new(config.output.attribution.as_str()).feature(&mention, road) {
                Some(feature) => println!("{}", serde_json::to_string_pretty(&feature)?),
                None => log::warn!("No map match for {}", mention.name),
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }
    }

    Ok(())
}

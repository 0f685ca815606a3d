use clap::Parser;
use plant_cert_crawler::sheet;
use plant_cert_crawler::{
    run_batch, CrawlerConfig, CrawlerError, GoogleLookup, PlantLookup, SqliteStorage, Storage,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;

/// Crawls processing plant websites for seafood certification mentions.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// Plant list with a `Company name` column
    #[arg(short, long)]
    input: PathBuf,

    /// Output spreadsheet
    #[arg(short, long, default_value = "certifications.csv")]
    output: PathBuf,

    /// SQLite file holding crawl results across runs
    #[arg(long, default_value = "plants.sqlite3")]
    db: String,

    /// Table prefix inside the database
    #[arg(long, default_value = "certs")]
    name: String,

    /// One output row per certification instead of one per plant
    #[arg(long)]
    split: bool,

    /// Look up websites and location fields missing from the input
    #[arg(long)]
    discover: bool,

    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    google_api_key: Option<String>,

    #[arg(long, env = "GOOGLE_CSE_ID", hide_env_values = true)]
    google_cse_id: Option<String>,

    #[command(flatten)]
    crawler: CrawlerConfig,
}

fn plant_lookup(cli: &Cli) -> Result<Option<Arc<dyn PlantLookup>>, CrawlerError> {
    if !cli.discover {
        return Ok(None);
    }
    match (&cli.google_api_key, &cli.google_cse_id) {
        (Some(key), Some(cx)) => Ok(Some(Arc::new(GoogleLookup::new(
            key,
            cx,
            cli.crawler.timeout(),
        )?))),
        _ => Err(CrawlerError::ConfigurationError(
            "--discover needs GOOGLE_API_KEY and GOOGLE_CSE_ID".to_string(),
        )),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
                "info,html5ever=error,selectors=error,hyper=warn,reqwest=info,sqlx=warn".into()
            }),
        )
        .with(ErrorLayer::default())
        .init();

    let cli = Cli::parse();
    let lookup = plant_lookup(&cli)?;

    let plants = sheet::read_plants_from_path(&cli.input)?;
    info!("Loaded {} plants from {}", plants.len(), cli.input.display());

    let started = Instant::now();
    let storage = SqliteStorage::new(&cli.db, &cli.name).await?;
    let reports = run_batch(plants.clone(), cli.crawler.clone(), storage, lookup).await?;
    info!(
        "Crawled {} plants in {:.1?}",
        reports.len(),
        started.elapsed()
    );

    let storage = SqliteStorage::new(&cli.db, &cli.name).await?;
    info!(
        "Stored matches: {}, failed fetches: {}",
        storage.results_count().await?,
        storage.failed_count().await?
    );

    let rows = sheet::rows_from_storage(&storage, &plants).await?;
    sheet::write_output(&cli.output, &rows, cli.split)?;
    info!("Wrote {}", cli.output.display());

    Ok(())
}

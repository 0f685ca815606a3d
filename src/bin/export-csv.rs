use clap::Parser;
use plant_cert_crawler::sheet;
use plant_cert_crawler::SqliteStorage;
use std::path::PathBuf;

/// Writes the spreadsheet from an existing database without crawling.
#[derive(Debug, Parser)]
struct Cli {
    /// Plant list the database was filled from
    #[arg(short, long)]
    input: PathBuf,

    #[arg(short, long, default_value = "certifications.csv")]
    output: PathBuf,

    #[arg(long, default_value = "plants.sqlite3")]
    db: String,

    #[arg(long, default_value = "certs")]
    name: String,

    #[arg(long)]
    split: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let plants = sheet::read_plants_from_path(&cli.input)?;
    let storage = SqliteStorage::new(&cli.db, &cli.name).await?;
    let rows = sheet::rows_from_storage(&storage, &plants).await?;
    sheet::write_output(&cli.output, &rows, cli.split)?;

    println!("Exported {} plants to {}", rows.len(), cli.output.display());
    Ok(())
}

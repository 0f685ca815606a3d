use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

pub mod config;
pub mod crawler;
pub mod discovery;
pub mod matcher;
pub mod plant;
pub mod sheet;
pub mod storage;

mod data;
mod error;
mod utils;

pub use config::CrawlerConfig;
pub use crawler::{crawl_plant, Fetcher};
pub use data::Table;
pub use discovery::{Discovered, GoogleLookup, PlantLookup};
pub use error::{CrawlerError, FetchError};
pub use matcher::{CertifyingBody, Matcher};
pub use plant::{CrawlState, FailedFetch, FinishedPlant, MatchRecord, Plant, PlantReport};
pub use storage::SqliteStorage;

/// Shared output sink. Only the batch loop writes to it.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    /// Write-once per (plant, certifying body). Returns `false` when a URL was
    /// already stored for the pair.
    async fn results_insert(&self, record: &MatchRecord) -> Result<bool, CrawlerError>;
    async fn results_get(&self, plant: &str) -> Result<Vec<MatchRecord>, CrawlerError>;
    async fn results_count(&self) -> Result<u32, CrawlerError>;

    async fn failed_insert(&self, plant: &str, failure: &FailedFetch) -> Result<(), CrawlerError>;
    async fn failed_count(&self) -> Result<u32, CrawlerError>;

    async fn finished_insert(&self, report: &PlantReport) -> Result<(), CrawlerError>;
    async fn finished_get(&self, plant: &str) -> Result<Option<FinishedPlant>, CrawlerError>;

    async fn finished_is_exists(&self, plant: &str) -> Result<bool, CrawlerError> {
        Ok(self.finished_get(plant).await?.is_some())
    }

    async fn save_report(&self, report: &PlantReport) -> Result<(), CrawlerError> {
        for record in report.records() {
            if !self.results_insert(&record).await? {
                debug!(
                    plant = %record.plant,
                    body = %record.certifying_body,
                    "Match already stored, keep the first one"
                );
            }
        }
        for failure in &report.failures {
            self.failed_insert(&report.plant.name, failure).await?;
        }
        self.finished_insert(report).await
    }
}

/// Crawls every plant not yet finished in `storage`, `plant_workers` at a
/// time, and stores each report as soon as it arrives.
pub async fn run_batch<S>(
    plants: Vec<Plant>,
    config: CrawlerConfig,
    storage: S,
    lookup: Option<Arc<dyn PlantLookup>>,
) -> Result<Vec<PlantReport>, CrawlerError>
where
    S: Storage + 'static,
{
    let fetcher = Fetcher::new(&config)?;
    let matcher = Arc::new(Matcher::default());
    let config = Arc::new(config);
    let permits = Arc::new(Semaphore::new(config.plant_workers.max(1)));

    let mut queue = vec![];
    for plant in plants {
        if storage.finished_is_exists(&plant.name).await? {
            debug!(plant = %plant.name, "Already finished, skip");
        } else {
            queue.push(plant);
        }
    }
    info!("Plants to crawl: {}", queue.len());

    let (tx, mut rx) = mpsc::channel::<PlantReport>(config.plant_workers.max(1));

    for plant in queue {
        let tx = tx.clone();
        let permits = Arc::clone(&permits);
        let fetcher = fetcher.clone();
        let matcher = Arc::clone(&matcher);
        let config = Arc::clone(&config);
        let lookup = lookup.clone();

        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let plant = match lookup {
                Some(lookup) => discover(plant, lookup.as_ref()).await,
                None => plant,
            };
            let report = crawl_plant(plant, &fetcher, &matcher, &config).await;
            if tx.send(report).await.is_err() {
                warn!("Report receiver dropped");
            }
        });
    }
    drop(tx);

    let mut reports = vec![];
    while let Some(report) = rx.recv().await {
        storage.save_report(&report).await?;
        info!(
            "[{}] Stored {} ({}, {} matches)",
            reports.len() + 1,
            report.plant.name,
            report.state,
            report.matches.len()
        );
        reports.push(report);
    }

    Ok(reports)
}

/// Fills the plant's empty website and location fields from the lookup.
/// Lookup failures leave the plant as it was.
async fn discover(mut plant: Plant, lookup: &dyn PlantLookup) -> Plant {
    if !plant.has_missing_info() {
        return plant;
    }
    match lookup.lookup(&plant).await {
        Ok(found) => {
            let filled = found.fill(&mut plant);
            if filled.is_empty() {
                info!(plant = %plant.name, "Nothing discovered");
            } else {
                info!(plant = %plant.name, website = ?plant.website, ?filled, "Discovered");
            }
        }
        Err(e) => warn!(plant = %plant.name, "Lookup failed: {}", e),
    }
    plant
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use tokio::fs;

    struct FixedLookup(String);

    #[async_trait::async_trait]
    impl PlantLookup for FixedLookup {
        async fn lookup(&self, _plant: &Plant) -> Result<Discovered, CrawlerError> {
            Ok(Discovered {
                website: Some(self.0.clone()),
                country: Some("Chile".to_string()),
                ..Default::default()
            })
        }
    }

    async fn fresh_storage(file: &str) -> SqliteStorage {
        if Path::new(file).is_file() {
            fs::remove_file(file).await.unwrap();
        }
        SqliteStorage::new(file, "batch").await.unwrap()
    }

    #[tokio::test]
    async fn batch_stores_every_plant_and_skips_finished() {
        let mut server = mockito::Server::new_async().await;
        let _home = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body>Member of Marin Trust</body></html>")
            .create_async()
            .await;

        let plants = vec![
            Plant::new("Harbour Fish").with_website(server.url()),
            Plant::new("No Site Seafood"),
        ];

        let storage = fresh_storage("test_batch_1.db").await;
        let reports = run_batch(plants.clone(), CrawlerConfig::default(), storage, None)
            .await
            .unwrap();
        assert_eq!(reports.len(), 2);

        let storage = SqliteStorage::new("test_batch_1.db", "batch").await.unwrap();
        assert_eq!(
            storage.results_get("Harbour Fish").await.unwrap(),
            vec![MatchRecord {
                plant: "Harbour Fish".to_string(),
                certifying_body: CertifyingBody::MarinTrust,
                url: format!("{}/", server.url()),
            }]
        );
        assert_eq!(
            storage.finished_get("No Site Seafood").await.unwrap().map(|f| f.state),
            Some(CrawlState::Exhausted)
        );

        let again = run_batch(plants, CrawlerConfig::default(), storage, None)
            .await
            .unwrap();
        assert!(again.is_empty());

        fs::remove_file("test_batch_1.db").await.unwrap();
    }

    #[tokio::test]
    async fn discovered_website_is_crawled() {
        let mut server = mockito::Server::new_async().await;
        let _home = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body>World Sustainability Organization</body></html>")
            .create_async()
            .await;

        let storage = fresh_storage("test_batch_2.db").await;
        let lookup: Arc<dyn PlantLookup> = Arc::new(FixedLookup(server.url()));
        let reports = run_batch(
            vec![Plant::new("Lost Plant")],
            CrawlerConfig::default(),
            storage,
            Some(lookup),
        )
        .await
        .unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].plant.website, Some(server.url()));
        assert_eq!(
            reports[0].matches.keys().copied().collect::<Vec<_>>(),
            vec![CertifyingBody::FriendOfTheSea]
        );
        assert_eq!(reports[0].plant.country.as_deref(), Some("Chile"));

        let storage = SqliteStorage::new("test_batch_2.db", "batch").await.unwrap();
        let finished = storage.finished_get("Lost Plant").await.unwrap().unwrap();
        assert_eq!(finished.plant.website, Some(server.url()));
        assert_eq!(finished.plant.country.as_deref(), Some("Chile"));

        fs::remove_file("test_batch_2.db").await.unwrap();
    }
}

use crate::plant::{FailedFetch, FinishedPlant, MatchRecord, Plant, PlantReport};
use crate::{utils, CrawlerError, Storage, Table};
use sqlx::{sqlite::SqliteConnectOptions, Row, SqlitePool};

pub struct MatchTable {
    name: String,
    pool: SqlitePool,
}

#[async_trait::async_trait]
impl Table for MatchTable {
    type Record<'a> = &'a MatchRecord;

    fn get_name(&self) -> &str {
        self.name.as_str()
    }

    fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create(&self) -> Result<(), sqlx::Error> {
        let query = format!(
            "CREATE TABLE {} (
                plant TEXT NOT NULL,
                certifying_body TEXT NOT NULL,
                url TEXT NOT NULL,
                created_at DATETIME,
                PRIMARY KEY (plant, certifying_body)
             )",
            &self.name
        );
        sqlx::query(query.as_str()).execute(self.get_pool()).await?;
        Ok(())
    }

    async fn insert<'a>(&self, record: Self::Record<'a>) -> Result<bool, sqlx::Error> {
        let query = format!(
            "INSERT OR IGNORE INTO {} (plant, certifying_body, url, created_at) VALUES (?, ?, ?, ?)",
            self.name
        );
        let done = sqlx::query(&query)
            .bind(record.plant.as_str())
            .bind(record.certifying_body.as_str())
            .bind(record.url.as_str())
            .bind(utils::get_now())
            .execute(self.get_pool())
            .await?;
        Ok(done.rows_affected() > 0)
    }
}

pub struct FailedTable {
    name: String,
    pool: SqlitePool,
}

#[async_trait::async_trait]
impl Table for FailedTable {
    type Record<'a> = (&'a str, &'a FailedFetch);

    fn get_name(&self) -> &str {
        self.name.as_str()
    }

    fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create(&self) -> Result<(), sqlx::Error> {
        let query = format!(
            "CREATE TABLE {} (
                plant TEXT NOT NULL,
                url TEXT NOT NULL,
                reason TEXT,
                created_at DATETIME,
                PRIMARY KEY (plant, url)
             )",
            &self.name
        );
        sqlx::query(query.as_str()).execute(self.get_pool()).await?;
        Ok(())
    }

    async fn insert<'a>(&self, (plant, failure): Self::Record<'a>) -> Result<bool, sqlx::Error> {
        let query = format!(
            "INSERT OR REPLACE INTO {} (plant, url, reason, created_at) VALUES (?, ?, ?, ?)",
            self.name
        );
        let done = sqlx::query(&query)
            .bind(plant)
            .bind(failure.url.as_str())
            .bind(failure.error.to_string())
            .bind(utils::get_now())
            .execute(self.get_pool())
            .await?;
        Ok(done.rows_affected() > 0)
    }
}

pub struct FinishedTable {
    name: String,
    pool: SqlitePool,
}

#[async_trait::async_trait]
impl Table for FinishedTable {
    type Record<'a> = &'a PlantReport;

    fn get_name(&self) -> &str {
        self.name.as_str()
    }

    fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create(&self) -> Result<(), sqlx::Error> {
        let query = format!(
            "CREATE TABLE {} (
                plant TEXT PRIMARY KEY,
                website TEXT,
                country TEXT,
                city TEXT,
                province TEXT,
                address TEXT,
                state TEXT NOT NULL,
                visited INTEGER NOT NULL,
                created_at DATETIME
             )",
            &self.name
        );
        sqlx::query(query.as_str()).execute(self.get_pool()).await?;
        Ok(())
    }

    async fn insert<'a>(&self, report: Self::Record<'a>) -> Result<bool, sqlx::Error> {
        let query = format!(
            "INSERT OR REPLACE INTO {} (plant, website, country, city, province, address, state, visited, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.name
        );
        let plant = &report.plant;
        let done = sqlx::query(&query)
            .bind(plant.name.as_str())
            .bind(plant.website.as_deref())
            .bind(plant.country.as_deref())
            .bind(plant.city.as_deref())
            .bind(plant.province.as_deref())
            .bind(plant.address.as_deref())
            .bind(report.state.as_str())
            .bind(report.visited as u32)
            .bind(utils::get_now())
            .execute(self.get_pool())
            .await?;
        Ok(done.rows_affected() > 0)
    }
}

/// SQLite-backed output sink. Every table is prefixed with the run name, so
/// one database file can hold several runs.
pub struct SqliteStorage {
    pub name: String,
    pub matches: MatchTable,
    pub failed: FailedTable,
    pub finished: FinishedTable,
    pool: SqlitePool,
}

impl SqliteStorage {
    pub async fn new(path: &str, name: &str) -> Result<SqliteStorage, CrawlerError> {
        let opt = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(opt).await?;
        let s = SqliteStorage {
            name: name.to_string(),
            matches: MatchTable {
                name: format!("{}_matches", name),
                pool: pool.clone(),
            },
            failed: FailedTable {
                name: format!("{}_failed", name),
                pool: pool.clone(),
            },
            finished: FinishedTable {
                name: format!("{}_finished", name),
                pool: pool.clone(),
            },
            pool,
        };

        macro_rules! ensure_table {
            ($table:expr) => {
                if !utils::is_table_exists(&s.pool, $table.get_name()).await? {
                    tracing::debug!("Create table {}", $table.get_name());
                    $table.create().await?;
                } else {
                    tracing::debug!("Use table {}", $table.get_name());
                }
            };
        }
        ensure_table!(s.matches);
        ensure_table!(s.failed);
        ensure_table!(s.finished);

        Ok(s)
    }
}

#[async_trait::async_trait]
impl Storage for SqliteStorage {
    async fn results_insert(&self, record: &MatchRecord) -> Result<bool, CrawlerError> {
        Ok(self.matches.insert(record).await?)
    }

    async fn results_get(&self, plant: &str) -> Result<Vec<MatchRecord>, CrawlerError> {
        let query = format!(
            "SELECT certifying_body, url FROM {} WHERE plant = ? ORDER BY certifying_body",
            self.matches.get_name()
        );
        let mut records = vec![];
        for row in sqlx::query(&query).bind(plant).fetch_all(&self.pool).await? {
            let body: String = row.try_get("certifying_body")?;
            match body.parse() {
                Ok(certifying_body) => records.push(MatchRecord {
                    plant: plant.to_string(),
                    certifying_body,
                    url: row.try_get("url")?,
                }),
                Err(e) => tracing::warn!("Ignore stored match: {}", e),
            }
        }
        records.sort_by_key(|r| r.certifying_body);
        Ok(records)
    }

    async fn results_count(&self) -> Result<u32, CrawlerError> {
        Ok(self.matches.count().await?)
    }

    async fn failed_insert(&self, plant: &str, failure: &FailedFetch) -> Result<(), CrawlerError> {
        self.failed.insert((plant, failure)).await?;
        Ok(())
    }

    async fn failed_count(&self) -> Result<u32, CrawlerError> {
        Ok(self.failed.count().await?)
    }

    async fn finished_insert(&self, report: &PlantReport) -> Result<(), CrawlerError> {
        self.finished.insert(report).await?;
        Ok(())
    }

    async fn finished_is_exists(&self, plant: &str) -> Result<bool, CrawlerError> {
        Ok(self.finished.is_exist(plant).await?)
    }

    async fn finished_get(&self, plant: &str) -> Result<Option<FinishedPlant>, CrawlerError> {
        let query = format!(
            "SELECT website, country, city, province, address, state, visited FROM {} WHERE plant = ?",
            self.finished.get_name()
        );
        let Some(row) = sqlx::query(&query)
            .bind(plant)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let state: String = row.try_get("state")?;
        let Ok(state) = state.parse() else {
            tracing::warn!("Ignore finished plant {} with state {}", plant, state);
            return Ok(None);
        };
        Ok(Some(FinishedPlant {
            plant: Plant {
                name: plant.to_string(),
                website: row.try_get("website")?,
                country: row.try_get("country")?,
                city: row.try_get("city")?,
                province: row.try_get("province")?,
                address: row.try_get("address")?,
            },
            state,
            visited: row.try_get("visited")?,
        }))
    }
}

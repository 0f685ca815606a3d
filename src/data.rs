use sqlx::{Row, SqlitePool};

/// A SQLite table whose rows all belong to a plant.
#[async_trait::async_trait]
pub trait Table {
    type Record<'a>;

    fn get_name(&self) -> &str;
    fn get_pool(&self) -> &SqlitePool;

    async fn create(&self) -> Result<(), sqlx::Error>;

    /// Returns whether a row was written.
    async fn insert<'a>(&self, record: Self::Record<'a>) -> Result<bool, sqlx::Error>;

    async fn is_exist<I: AsRef<str> + Send + Sync>(&self, plant: I) -> Result<bool, sqlx::Error> {
        let query = format!("SELECT plant FROM {} WHERE plant = ?", self.get_name());
        Ok(sqlx::query(&query)
            .bind(plant.as_ref())
            .fetch_optional(self.get_pool())
            .await?
            .is_some())
    }

    async fn count(&self) -> Result<u32, sqlx::Error> {
        let query = format!("SELECT COUNT(*) FROM {}", self.get_name());
        Ok(sqlx::query(&query)
            .fetch_one(self.get_pool())
            .await?
            .try_get(0)?)
    }
}

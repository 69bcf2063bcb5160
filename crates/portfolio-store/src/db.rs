use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

const DEFAULT_POOL_SIZE: u32 = 5;

#[derive(Clone)]
pub struct PortfolioDb {
    pool: SqlitePool,
}

impl PortfolioDb {
    /// Open (creating if missing) and apply the schema. Pool size comes from
    /// `DATABASE_MAX_CONNECTIONS`, defaulting to 5.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool_size = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_POOL_SIZE);
        Self::with_pool_size(database_url, pool_size).await
    }

    pub async fn with_pool_size(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.apply_schema().await?;

        Ok(db)
    }

    /// Run schema.sql statement by statement; sqlx rejects multi-statement
    /// query strings.
    async fn apply_schema(&self) -> Result<()> {
        for statement in include_str!("schema.sql").split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await?;
            }
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

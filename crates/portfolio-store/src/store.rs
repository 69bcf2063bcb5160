use crate::db::PortfolioDb;
use crate::models::*;
use anyhow::{anyhow, Result};

pub struct PortfolioStore {
    db: PortfolioDb,
}

impl PortfolioStore {
    pub fn new(db: PortfolioDb) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &PortfolioDb {
        &self.db
    }

    // ---- portfolios ----

    pub async fn create_portfolio(&self, input: PortfolioInput) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO portfolios (name, start_date, end_date, description, manager_name)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&input.name)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(&input.description)
        .bind(&input.manager_name)
        .fetch_one(self.db.pool())
        .await?;

        Ok(id)
    }

    pub async fn get_portfolio(&self, id: i64) -> Result<Option<Portfolio>> {
        let portfolio = sqlx::query_as::<_, Portfolio>("SELECT * FROM portfolios WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(portfolio)
    }

    pub async fn list_portfolios(&self) -> Result<Vec<Portfolio>> {
        let portfolios = sqlx::query_as::<_, Portfolio>("SELECT * FROM portfolios ORDER BY name")
            .fetch_all(self.db.pool())
            .await?;

        Ok(portfolios)
    }

    pub async fn update_portfolio(&self, id: i64, input: PortfolioInput) -> Result<Portfolio> {
        let existing = self
            .get_portfolio(id)
            .await?
            .ok_or_else(|| anyhow!("Portfolio not found: {}", id))?;

        sqlx::query(
            r#"
            UPDATE portfolios
            SET name = ?, start_date = ?, end_date = ?, description = ?, manager_name = ?
            WHERE id = ?
            "#,
        )
        .bind(&input.name)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(&input.description)
        .bind(&input.manager_name)
        .bind(id)
        .execute(self.db.pool())
        .await?;

        Ok(Portfolio {
            id: existing.id,
            name: input.name,
            start_date: input.start_date,
            end_date: input.end_date,
            description: input.description,
            manager_name: input.manager_name,
            created_at: existing.created_at,
        })
    }

    /// Delete a portfolio and its positions.
    pub async fn delete_portfolio(&self, id: i64) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;
        sqlx::query("DELETE FROM positions WHERE portfolio_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM portfolios WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("Portfolio not found: {}", id));
        }
        Ok(())
    }

    // ---- positions ----

    pub async fn add_position(&self, portfolio_id: i64, input: PositionInput) -> Result<i64> {
        self.get_portfolio(portfolio_id)
            .await?
            .ok_or_else(|| anyhow!("Portfolio not found: {}", portfolio_id))?;

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO positions (portfolio_id, symbol, quantity)
            VALUES (?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(portfolio_id)
        .bind(&input.symbol)
        .bind(input.quantity)
        .fetch_one(self.db.pool())
        .await?;

        Ok(id)
    }

    pub async fn positions_for(&self, portfolio_id: i64) -> Result<Vec<Position>> {
        let positions = sqlx::query_as::<_, Position>(
            "SELECT * FROM positions WHERE portfolio_id = ? ORDER BY symbol",
        )
        .bind(portfolio_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(positions)
    }

    pub async fn update_position(&self, id: i64, input: PositionInput) -> Result<()> {
        let result = sqlx::query("UPDATE positions SET symbol = ?, quantity = ? WHERE id = ?")
            .bind(&input.symbol)
            .bind(input.quantity)
            .bind(id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("Position not found: {}", id));
        }
        Ok(())
    }

    pub async fn delete_position(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM positions WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("Position not found: {}", id));
        }
        Ok(())
    }

    // ---- reference data ----

    pub async fn get_asset(&self, symbol: &str) -> Result<Option<Asset>> {
        let asset = sqlx::query_as::<_, Asset>("SELECT * FROM assets WHERE symbol = ?")
            .bind(symbol)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(asset)
    }

    pub async fn list_assets(&self) -> Result<Vec<Asset>> {
        let assets = sqlx::query_as::<_, Asset>("SELECT * FROM assets ORDER BY symbol")
            .fetch_all(self.db.pool())
            .await?;

        Ok(assets)
    }

    pub async fn upsert_asset(&self, asset: &Asset) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO assets (symbol, isin, name, ticker, currency, description)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(symbol) DO UPDATE SET
                isin = COALESCE(excluded.isin, assets.isin),
                name = COALESCE(excluded.name, assets.name),
                ticker = COALESCE(excluded.ticker, assets.ticker),
                currency = COALESCE(excluded.currency, assets.currency),
                description = COALESCE(excluded.description, assets.description)
            "#,
        )
        .bind(&asset.symbol)
        .bind(&asset.isin)
        .bind(&asset.name)
        .bind(&asset.ticker)
        .bind(&asset.currency)
        .bind(&asset.description)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    /// Bulk upsert for reference-data ingestion. Returns the row count.
    pub async fn upsert_assets(&self, assets: &[Asset]) -> Result<usize> {
        let mut tx = self.db.pool().begin().await?;
        for asset in assets {
            sqlx::query(
                r#"
                INSERT INTO assets (symbol, isin, name, ticker, currency, description)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(symbol) DO UPDATE SET
                    isin = COALESCE(excluded.isin, assets.isin),
                    name = COALESCE(excluded.name, assets.name),
                    ticker = COALESCE(excluded.ticker, assets.ticker),
                    currency = COALESCE(excluded.currency, assets.currency),
                    description = COALESCE(excluded.description, assets.description)
                "#,
            )
            .bind(&asset.symbol)
            .bind(&asset.isin)
            .bind(&asset.name)
            .bind(&asset.ticker)
            .bind(&asset.currency)
            .bind(&asset.description)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(assets.len())
    }
}

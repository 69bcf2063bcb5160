use analytics_core::AnalyticsError;
use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use portfolio_store::Asset;
use serde::Deserialize;

use crate::{ApiResponse, AppError, AppState};

#[derive(Deserialize)]
pub struct AssetRequest {
    pub isin: Option<String>,
    pub name: Option<String>,
    pub ticker: Option<String>,
    pub currency: Option<String>,
    pub description: Option<String>,
}

pub fn referential_routes() -> Router<AppState> {
    Router::new()
        .route("/api/referential", get(list_assets))
        .route("/api/referential/:symbol", get(get_asset))
        .route("/api/referential/:symbol", put(upsert_asset))
        .route("/api/referential/upload-csv", post(upload_csv))
}

async fn list_assets(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Asset>>>, AppError> {
    let assets = state.store.list_assets().await?;

    Ok(Json(ApiResponse::success(assets)))
}

async fn get_asset(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<Asset>>, AppError> {
    let symbol = symbol.to_uppercase();
    let asset = state
        .store
        .get_asset(&symbol)
        .await?
        .ok_or_else(|| AnalyticsError::NotFound(format!("unknown symbol '{symbol}'")))?;

    Ok(Json(ApiResponse::success(asset)))
}

async fn upsert_asset(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Json(req): Json<AssetRequest>,
) -> Result<Json<ApiResponse<Asset>>, AppError> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(AnalyticsError::InvalidInput("symbol is required".to_string()).into());
    }

    let asset = Asset {
        symbol: symbol.clone(),
        isin: req.isin,
        name: req.name,
        ticker: req.ticker,
        currency: req.currency,
        description: req.description,
    };
    state.store.upsert_asset(&asset).await?;

    let stored = state
        .store
        .get_asset(&symbol)
        .await?
        .ok_or_else(|| AnalyticsError::NotFound(format!("unknown symbol '{symbol}'")))?;

    Ok(Json(ApiResponse::success(stored)))
}

/// Bulk reference-data ingestion from an uploaded CSV document.
///
/// Requires a `symbol` column; `isin`, `name`, `ticker`, `currency` and
/// `description` are merged when present. Rows without a symbol are skipped.
async fn upload_csv(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    if body.trim().is_empty() {
        return Err(AnalyticsError::InvalidInput("empty file".to_string()).into());
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AnalyticsError::InvalidInput(format!("invalid CSV: {e}")))?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let symbol_idx = headers
        .iter()
        .position(|h| h == "symbol")
        .ok_or_else(|| AnalyticsError::InvalidInput("missing required column: 'symbol'".to_string()))?;
    let col = |name: &str| headers.iter().position(|h| h == name);
    let (isin_idx, name_idx, ticker_idx, currency_idx, description_idx) = (
        col("isin"),
        col("name"),
        col("ticker"),
        col("currency"),
        col("description"),
    );

    let mut rows_in_file = 0usize;
    let mut assets = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| AnalyticsError::InvalidInput(format!("invalid CSV: {e}")))?;
        rows_in_file += 1;

        let symbol = record.get(symbol_idx).unwrap_or("").trim().to_uppercase();
        if symbol.is_empty() {
            continue;
        }

        let field = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        assets.push(Asset {
            symbol,
            isin: field(isin_idx),
            name: field(name_idx),
            ticker: field(ticker_idx),
            currency: field(currency_idx),
            description: field(description_idx),
        });
    }

    if assets.is_empty() {
        return Ok(Json(ApiResponse::success(serde_json::json!({
            "inserted_or_updated": 0,
            "rows_in_file": rows_in_file,
            "message": "No valid rows (empty or missing symbol)",
        }))));
    }

    let count = state.store.upsert_assets(&assets).await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "inserted_or_updated": count,
        "rows_in_file": rows_in_file,
    }))))
}

use analytics_core::AnalyticsError;
use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use portfolio_store::{Portfolio, PortfolioInput, Position, PositionInput};
use serde::Deserialize;

use crate::{ApiResponse, AppError, AppState};

#[derive(Deserialize)]
pub struct PortfolioRequest {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub manager_name: Option<String>,
}

impl PortfolioRequest {
    fn into_input(self) -> Result<PortfolioInput, AppError> {
        if self.name.trim().is_empty() {
            return Err(AnalyticsError::InvalidInput("portfolio name is required".to_string()).into());
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(AnalyticsError::InvalidInput(
                    "end_date must be on or after start_date".to_string(),
                )
                .into());
            }
        }
        Ok(PortfolioInput {
            name: self.name,
            start_date: self.start_date,
            end_date: self.end_date,
            description: self.description,
            manager_name: self.manager_name,
        })
    }
}

#[derive(Deserialize)]
pub struct PositionRequest {
    pub symbol: String,
    pub quantity: f64,
}

impl PositionRequest {
    fn into_input(self) -> Result<PositionInput, AppError> {
        if self.symbol.trim().is_empty() {
            return Err(AnalyticsError::InvalidInput("symbol is required".to_string()).into());
        }
        Ok(PositionInput {
            symbol: self.symbol.trim().to_uppercase(),
            quantity: self.quantity,
        })
    }
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/portfolios", post(create_portfolio))
        .route("/api/portfolios", get(list_portfolios))
        .route("/api/portfolios/:id", get(get_portfolio))
        .route("/api/portfolios/:id", put(update_portfolio))
        .route("/api/portfolios/:id", delete(delete_portfolio))
        .route("/api/portfolios/:id/positions", post(add_position))
        .route("/api/portfolios/:id/positions", get(list_positions))
        .route("/api/positions/:id", put(update_position))
        .route("/api/positions/:id", delete(delete_position))
}

async fn create_portfolio(
    State(state): State<AppState>,
    Json(req): Json<PortfolioRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let id = state.store.create_portfolio(req.into_input()?).await?;

    Ok(Json(ApiResponse::success(serde_json::json!({ "id": id }))))
}

async fn list_portfolios(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Portfolio>>>, AppError> {
    let portfolios = state.store.list_portfolios().await?;

    Ok(Json(ApiResponse::success(portfolios)))
}

async fn get_portfolio(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Portfolio>>, AppError> {
    let portfolio = state
        .store
        .get_portfolio(id)
        .await?
        .ok_or_else(|| AnalyticsError::NotFound(format!("portfolio {id} does not exist")))?;

    Ok(Json(ApiResponse::success(portfolio)))
}

async fn update_portfolio(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<PortfolioRequest>,
) -> Result<Json<ApiResponse<Portfolio>>, AppError> {
    state
        .store
        .get_portfolio(id)
        .await?
        .ok_or_else(|| AnalyticsError::NotFound(format!("portfolio {id} does not exist")))?;

    let updated = state.store.update_portfolio(id, req.into_input()?).await?;

    Ok(Json(ApiResponse::success(updated)))
}

async fn delete_portfolio(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    state
        .store
        .get_portfolio(id)
        .await?
        .ok_or_else(|| AnalyticsError::NotFound(format!("portfolio {id} does not exist")))?;

    state.store.delete_portfolio(id).await?;

    Ok(Json(ApiResponse::success(
        serde_json::json!({ "message": "Portfolio deleted" }),
    )))
}

async fn add_position(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<PositionRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    state
        .store
        .get_portfolio(id)
        .await?
        .ok_or_else(|| AnalyticsError::NotFound(format!("portfolio {id} does not exist")))?;

    let position_id = state.store.add_position(id, req.into_input()?).await?;

    Ok(Json(ApiResponse::success(
        serde_json::json!({ "id": position_id }),
    )))
}

async fn list_positions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<Position>>>, AppError> {
    state
        .store
        .get_portfolio(id)
        .await?
        .ok_or_else(|| AnalyticsError::NotFound(format!("portfolio {id} does not exist")))?;

    let positions = state.store.positions_for(id).await?;

    Ok(Json(ApiResponse::success(positions)))
}

async fn update_position(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<PositionRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    state.store.update_position(id, req.into_input()?).await?;

    Ok(Json(ApiResponse::success(
        serde_json::json!({ "message": "Position updated" }),
    )))
}

async fn delete_position(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    state.store.delete_position(id).await?;

    Ok(Json(ApiResponse::success(
        serde_json::json!({ "message": "Position deleted" }),
    )))
}

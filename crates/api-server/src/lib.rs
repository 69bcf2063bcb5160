pub mod admin_routes;
pub mod analytics_routes;
pub mod referential_routes;

use analytics_core::AnalyticsError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use market_data::{MarketDataService, YahooHistoryClient};
use portfolio_store::{PortfolioDb, PortfolioStore};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<PortfolioStore>,
    pub market: Arc<MarketDataService>,
}

/// Envelope for CRUD responses.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Route-level error carrying anything `anyhow` can hold.
///
/// `AnalyticsError` variants map onto their HTTP statuses; everything else is
/// a 500.
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<AnalyticsError>() {
            Some(AnalyticsError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            Some(AnalyticsError::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(AnalyticsError::InsufficientData(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Some(AnalyticsError::Upstream(_)) => StatusCode::BAD_GATEWAY,
            None => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {:#}", self.0);
        }
        (status, Json(ApiResponse::<()>::error(self.0.to_string()))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .merge(admin_routes::admin_routes())
        .merge(referential_routes::referential_routes())
        .merge(analytics_routes::analytics_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:folio.db".to_string());
    let db = PortfolioDb::new(&database_url).await?;
    let store = Arc::new(PortfolioStore::new(db));

    let provider = Arc::new(YahooHistoryClient::new());
    let market = Arc::new(MarketDataService::new(provider));

    let state = AppState { store, market };
    let app = app_router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("API server listening on port {}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

pub mod cache;
pub mod service;
pub mod yahoo;

pub use cache::{HistoryCache, HistoryKey};
pub use service::MarketDataService;
pub use yahoo::YahooHistoryClient;

use analytics_core::{AnalyticsError, Frequency, PriceSeries};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Batch daily-history fetch: the analytics engines' only upstream
/// dependency.
///
/// One call per batch of tickers. Transport failure is an `Upstream` error;
/// a ticker with no data maps to an empty series, never an error.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    async fn fetch_history(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
        frequency: Frequency,
        adjusted: bool,
    ) -> Result<HashMap<String, PriceSeries>, AnalyticsError>;
}

use analytics_core::{AnalyticsError, Frequency, PriceSeries};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{HistoryCache, HistoryKey, HistoryProvider};

const DEFAULT_TTL_SECS: i64 = 600;
const DEFAULT_MAX_ENTRIES: usize = 5000;

/// Read-through history access shared by every analytics endpoint.
///
/// One upstream fetch per batch of tickers; repeat requests within the TTL
/// are served from the cache.
pub struct MarketDataService {
    provider: Arc<dyn HistoryProvider>,
    cache: HistoryCache,
}

impl MarketDataService {
    pub fn new(provider: Arc<dyn HistoryProvider>) -> Self {
        let ttl = std::env::var("HISTORY_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TTL_SECS);
        let max_entries = std::env::var("HISTORY_CACHE_MAX_ENTRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_ENTRIES);
        Self::with_cache(provider, HistoryCache::new(ttl, max_entries))
    }

    pub fn with_cache(provider: Arc<dyn HistoryProvider>, cache: HistoryCache) -> Self {
        Self { provider, cache }
    }

    pub async fn history(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
        frequency: Frequency,
        adjusted: bool,
    ) -> Result<HashMap<String, PriceSeries>, AnalyticsError> {
        let key = HistoryKey::new(tickers, start, end, frequency, adjusted);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(tickers = tickers.len(), "history cache hit");
            return Ok(hit);
        }

        let data = self
            .provider
            .fetch_history(tickers, start, end, frequency, adjusted)
            .await?;
        self.cache.insert(key, data.clone());
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts upstream calls; returns a one-point series per ticker.
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HistoryProvider for CountingProvider {
        async fn fetch_history(
            &self,
            tickers: &[String],
            start: NaiveDate,
            _end: NaiveDate,
            _frequency: Frequency,
            _adjusted: bool,
        ) -> Result<HashMap<String, PriceSeries>, AnalyticsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(tickers
                .iter()
                .map(|t| (t.clone(), PriceSeries::from_points(vec![(start, 100.0)])))
                .collect())
        }
    }

    #[tokio::test]
    async fn test_second_identical_request_hits_cache() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let service =
            MarketDataService::with_cache(provider.clone(), HistoryCache::new(600, 100));

        let tickers = vec!["AAPL".to_string(), "SPY".to_string()];
        let start: NaiveDate = "2024-01-01".parse().unwrap();
        let end: NaiveDate = "2024-06-01".parse().unwrap();

        let first = service
            .history(&tickers, start, end, Frequency::Daily, true)
            .await
            .unwrap();
        assert_eq!(first.len(), 2);

        // Same request, reversed ticker order: still one upstream call
        let reversed = vec!["SPY".to_string(), "AAPL".to_string()];
        service
            .history(&reversed, start, end, Frequency::Daily, true)
            .await
            .unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        // Different window misses
        let end2: NaiveDate = "2024-07-01".parse().unwrap();
        service
            .history(&tickers, start, end2, Frequency::Daily, true)
            .await
            .unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}

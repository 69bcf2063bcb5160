use analytics_core::{Frequency, PriceSeries};
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use std::collections::HashMap;

/// Cache key for one batch fetch. Tickers are sorted so request order does
/// not fragment the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HistoryKey {
    pub tickers: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub frequency: Frequency,
    pub adjusted: bool,
}

impl HistoryKey {
    pub fn new(
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
        frequency: Frequency,
        adjusted: bool,
    ) -> Self {
        let mut tickers: Vec<String> = tickers.to_vec();
        tickers.sort();
        Self {
            tickers,
            start,
            end,
            frequency,
            adjusted,
        }
    }
}

struct CacheEntry {
    data: HashMap<String, PriceSeries>,
    cached_at: DateTime<Utc>,
}

/// Bounded TTL cache over batch history fetches.
///
/// A read-through memoization layer only: a miss is always recomputable from
/// the provider, so eviction is safe at any time.
pub struct HistoryCache {
    entries: DashMap<HistoryKey, CacheEntry>,
    ttl_secs: i64,
    max_entries: usize,
}

impl HistoryCache {
    pub fn new(ttl_secs: i64, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl_secs,
            max_entries,
        }
    }

    pub fn get(&self, key: &HistoryKey) -> Option<HashMap<String, PriceSeries>> {
        let entry = self.entries.get(key)?;
        let age = (Utc::now() - entry.cached_at).num_seconds();
        if age < self.ttl_secs {
            Some(entry.data.clone())
        } else {
            drop(entry);
            self.entries.remove(key);
            None
        }
    }

    pub fn insert(&self, key: HistoryKey, data: HashMap<String, PriceSeries>) {
        if self.entries.len() >= self.max_entries {
            self.evict_oldest();
        }
        self.entries.insert(
            key,
            CacheEntry {
                data,
                cached_at: Utc::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired entries, then the single oldest one if still at capacity.
    fn evict_oldest(&self) {
        let now = Utc::now();
        self.entries
            .retain(|_, entry| (now - entry.cached_at).num_seconds() < self.ttl_secs);
        if self.entries.len() < self.max_entries {
            return;
        }
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.value().cached_at)
            .map(|e| e.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(tickers: &[&str]) -> HistoryKey {
        HistoryKey::new(
            &tickers.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
            "2024-01-01".parse().unwrap(),
            "2024-06-01".parse().unwrap(),
            Frequency::Daily,
            true,
        )
    }

    #[test]
    fn test_key_is_order_insensitive() {
        assert_eq!(key(&["SPY", "AAPL"]), key(&["AAPL", "SPY"]));
    }

    #[test]
    fn test_hit_within_ttl() {
        let cache = HistoryCache::new(600, 100);
        let mut data = HashMap::new();
        data.insert("AAPL".to_string(), PriceSeries::default());
        cache.insert(key(&["AAPL"]), data);
        assert!(cache.get(&key(&["AAPL"])).is_some());
        assert!(cache.get(&key(&["MSFT"])).is_none());
    }

    #[test]
    fn test_expired_entry_is_removed_on_read() {
        let cache = HistoryCache::new(0, 100);
        cache.insert(key(&["AAPL"]), HashMap::new());
        assert!(cache.get(&key(&["AAPL"])).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_bound_holds() {
        let cache = HistoryCache::new(600, 2);
        cache.insert(key(&["A"]), HashMap::new());
        cache.insert(key(&["B"]), HashMap::new());
        cache.insert(key(&["C"]), HashMap::new());
        assert!(cache.len() <= 2);
        assert!(cache.get(&key(&["C"])).is_some());
    }
}

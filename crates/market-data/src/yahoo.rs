use analytics_core::{AnalyticsError, Frequency, PriceSeries};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::time::Duration as StdDuration;

use crate::HistoryProvider;

const CHART_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance chart-API client.
///
/// The chart endpoint is per-ticker; `fetch_history` fans the requests out
/// concurrently so a batch still costs one round of upstream calls.
#[derive(Clone)]
pub struct YahooHistoryClient {
    client: reqwest::Client,
}

impl YahooHistoryClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
                .timeout(StdDuration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    async fn fetch_one(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        frequency: Frequency,
        adjusted: bool,
    ) -> Result<PriceSeries, AnalyticsError> {
        let period1 = start
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(0);
        // end is inclusive; the chart API treats period2 as exclusive
        let period2 = (end + Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(0);

        let url = format!(
            "{}/{}?period1={}&period2={}&interval={}&events=div%2Csplit",
            CHART_URL,
            ticker,
            period1,
            period2,
            frequency.interval_code()
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AnalyticsError::Upstream(e.to_string()))?;

        // Yahoo answers 404 for unknown tickers; that is "no data", not an
        // upstream failure.
        if response.status().as_u16() == 404 {
            return Ok(PriceSeries::default());
        }
        if !response.status().is_success() {
            return Err(AnalyticsError::Upstream(format!(
                "chart request for {} returned {}",
                ticker,
                response.status()
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AnalyticsError::Upstream(e.to_string()))?;

        Ok(parse_chart(&json, adjusted))
    }
}

impl Default for YahooHistoryClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract (date, close) pairs from a chart response.
///
/// Prefers the adjusted-close indicator when `adjusted` is set and present.
/// Null entries are skipped rather than zero-filled; a missing result block
/// yields an empty series.
fn parse_chart(json: &serde_json::Value, adjusted: bool) -> PriceSeries {
    let Some(result) = json
        .get("chart")
        .and_then(|v| v.get("result"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
    else {
        return PriceSeries::default();
    };

    let Some(timestamps) = result.get("timestamp").and_then(|v| v.as_array()) else {
        return PriceSeries::default();
    };

    let indicators = result.get("indicators");
    let adjclose = indicators
        .and_then(|v| v.get("adjclose"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|v| v.get("adjclose"))
        .and_then(|v| v.as_array());
    let close = indicators
        .and_then(|v| v.get("quote"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|v| v.get("close"))
        .and_then(|v| v.as_array());

    // Whichever indicator matches the request wins; a payload carrying only
    // the other one is still data, not a missing ticker.
    let prices = match (adjusted, adjclose, close) {
        (true, Some(adj), _) => adj,
        (false, _, Some(raw)) => raw,
        (_, Some(adj), None) => adj,
        (_, None, Some(raw)) => raw,
        _ => return PriceSeries::default(),
    };

    let mut points = Vec::with_capacity(timestamps.len());
    for (ts, price) in timestamps.iter().zip(prices.iter()) {
        let (Some(ts), Some(price)) = (ts.as_i64(), price.as_f64()) else {
            continue;
        };
        let Some(date) = DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive()) else {
            continue;
        };
        points.push((date, price));
    }
    PriceSeries::from_points(points)
}

#[async_trait]
impl HistoryProvider for YahooHistoryClient {
    async fn fetch_history(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
        frequency: Frequency,
        adjusted: bool,
    ) -> Result<HashMap<String, PriceSeries>, AnalyticsError> {
        let fetches = tickers
            .iter()
            .map(|t| self.fetch_one(t, start, end, frequency, adjusted));
        let results = join_all(fetches).await;

        let mut out = HashMap::with_capacity(tickers.len());
        for (ticker, result) in tickers.iter().zip(results) {
            // A whole-batch transport failure aborts; per-ticker "no data"
            // was already mapped to an empty series.
            out.insert(ticker.clone(), result?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chart_payload(adj: Vec<serde_json::Value>, raw: Vec<serde_json::Value>) -> serde_json::Value {
        json!({
            "chart": {
                "result": [{
                    "timestamp": [1704153600i64, 1704240000i64, 1704326400i64],
                    "indicators": {
                        "adjclose": [{ "adjclose": adj }],
                        "quote": [{ "close": raw }]
                    }
                }]
            }
        })
    }

    #[test]
    fn test_parse_prefers_adjclose_when_adjusted() {
        let payload = chart_payload(
            vec![json!(99.0), json!(100.0), json!(101.0)],
            vec![json!(199.0), json!(200.0), json!(201.0)],
        );
        let series = parse_chart(&payload, true);
        assert_eq!(series.len(), 3);
        assert_eq!(series.first().unwrap().price, 99.0);

        let series = parse_chart(&payload, false);
        assert_eq!(series.first().unwrap().price, 199.0);
    }

    #[test]
    fn test_parse_skips_null_observations() {
        let payload = chart_payload(
            vec![json!(99.0), json!(null), json!(101.0)],
            vec![json!(null), json!(null), json!(null)],
        );
        let series = parse_chart(&payload, true);
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_parse_falls_back_to_adjclose_when_raw_close_missing() {
        // Some payloads carry only the adjclose indicator
        let payload = json!({
            "chart": {
                "result": [{
                    "timestamp": [1704153600i64, 1704240000i64],
                    "indicators": {
                        "adjclose": [{ "adjclose": [json!(99.0), json!(100.0)] }]
                    }
                }]
            }
        });
        let series = parse_chart(&payload, false);
        assert_eq!(series.len(), 2);
        assert_eq!(series.first().unwrap().price, 99.0);
    }

    #[test]
    fn test_parse_empty_result_is_empty_series() {
        let payload = json!({ "chart": { "result": null } });
        assert!(parse_chart(&payload, true).is_empty());
    }

    #[test]
    fn test_parse_timestamps_map_to_utc_dates() {
        let payload = chart_payload(
            vec![json!(99.0), json!(100.0), json!(101.0)],
            vec![],
        );
        let series = parse_chart(&payload, true);
        // 1704153600 = 2024-01-02 00:00:00 UTC
        assert_eq!(
            series.first().unwrap().date,
            "2024-01-02".parse::<NaiveDate>().unwrap()
        );
    }
}

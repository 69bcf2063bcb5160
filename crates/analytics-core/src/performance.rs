use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::{AnalyticsError, PriceSeries, ReturnWindow};

/// Trailing performance table for one ticker, as-of an anchored date.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceTable {
    pub asof_requested: Option<NaiveDate>,
    pub asof_used: NaiveDate,
    pub last: f64,
    /// Window label -> percent return, `None` when no prior anchor exists.
    pub perf: BTreeMap<String, Option<f64>>,
}

/// Compute trailing percentage performance over the fixed lookback windows.
///
/// The "last" anchor is the observation at or before `asof` (latest
/// observation when `asof` is unset). Each window anchors its own target
/// date; an absent past anchor, or a past price of exactly zero, yields a
/// null cell rather than an error.
pub fn performance_asof(
    series: &PriceSeries,
    asof: Option<NaiveDate>,
) -> Result<PerformanceTable, AnalyticsError> {
    let last = series.anchor(asof).ok_or_else(|| match asof {
        Some(d) => AnalyticsError::NotFound(format!("no observation on or before {d}")),
        None => AnalyticsError::NotFound("empty price series".to_string()),
    })?;

    let mut perf = BTreeMap::new();
    for window in ReturnWindow::ALL {
        let target = window.target_date(last.used);
        let value = series
            .anchor(Some(target))
            .filter(|past| past.price != 0.0)
            .map(|past| (last.price / past.price - 1.0) * 100.0);
        perf.insert(window.label().to_string(), value);
    }

    Ok(PerformanceTable {
        asof_requested: asof,
        asof_used: last.used,
        last: last.price,
        perf,
    })
}

use chrono::NaiveDate;
use serde::Serialize;

use crate::{AnalyticsError, PriceSeries};

/// Percentage return between two anchored dates.
#[derive(Debug, Clone, Serialize)]
pub struct ArithmeticReturn {
    pub start_requested: NaiveDate,
    pub start_used: NaiveDate,
    pub start_price: f64,
    pub end_requested: NaiveDate,
    pub end_used: NaiveDate,
    pub end_price: f64,
    pub return_percent: f64,
}

/// Decimal cumulative-return series rebased to the start anchor.
#[derive(Debug, Clone, Serialize)]
pub struct CumulativeReturns {
    pub start_requested: NaiveDate,
    pub start_used: NaiveDate,
    pub base_price: f64,
    pub end_requested: Option<NaiveDate>,
    /// (date, cumulative return as a decimal); first entry is exactly 0.0.
    pub series: Vec<(NaiveDate, f64)>,
}

/// `(end_price / start_price - 1) * 100` between nearest-prior anchors.
pub fn arithmetic_return(
    series: &PriceSeries,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<ArithmeticReturn, AnalyticsError> {
    if end < start {
        return Err(AnalyticsError::InvalidInput(format!(
            "end date {end} is before start date {start}"
        )));
    }

    let start_anchor = series
        .anchor(Some(start))
        .ok_or_else(|| AnalyticsError::NotFound(format!("no observation on or before start date {start}")))?;
    let end_anchor = series
        .anchor(Some(end))
        .ok_or_else(|| AnalyticsError::NotFound(format!("no observation on or before end date {end}")))?;

    if start_anchor.price == 0.0 {
        return Err(AnalyticsError::NotFound(format!(
            "start price is zero on {}",
            start_anchor.used
        )));
    }

    Ok(ArithmeticReturn {
        start_requested: start,
        start_used: start_anchor.used,
        start_price: start_anchor.price,
        end_requested: end,
        end_used: end_anchor.used,
        end_price: end_anchor.price,
        return_percent: (end_anchor.price / start_anchor.price - 1.0) * 100.0,
    })
}

/// Rebase the series to the start anchor: `price / base_price - 1` for every
/// observation in `[start_used, end]`.
pub fn cumulative_returns(
    series: &PriceSeries,
    start: NaiveDate,
    end: Option<NaiveDate>,
) -> Result<CumulativeReturns, AnalyticsError> {
    if let Some(e) = end {
        if e < start {
            return Err(AnalyticsError::InvalidInput(format!(
                "end date {e} is before start date {start}"
            )));
        }
    }

    let base = series
        .anchor(Some(start))
        .ok_or_else(|| AnalyticsError::NotFound(format!("no observation on or before start date {start}")))?;

    if base.price == 0.0 {
        return Err(AnalyticsError::NotFound(format!(
            "base price is zero on {}",
            base.used
        )));
    }

    let window = series.window(Some(base.used), end);
    if window.is_empty() {
        return Err(AnalyticsError::NotFound(format!(
            "no observations between {} and {}",
            base.used,
            end.map(|d| d.to_string()).unwrap_or_else(|| "series end".to_string())
        )));
    }

    let points = window
        .iter()
        .map(|p| (p.date, p.price / base.price - 1.0))
        .collect();

    Ok(CumulativeReturns {
        start_requested: start,
        start_used: base.used,
        base_price: base.price,
        end_requested: end,
        series: points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn series() -> PriceSeries {
        PriceSeries::from_points(vec![
            (d("2024-01-02"), 100.0),
            (d("2024-01-03"), 104.0),
            (d("2024-01-04"), 98.0),
            (d("2024-01-05"), 110.0),
            (d("2024-01-08"), 120.0),
        ])
    }

    #[test]
    fn test_arithmetic_return_basic() {
        let r = arithmetic_return(&series(), d("2024-01-02"), d("2024-01-05")).unwrap();
        assert_eq!(r.start_used, d("2024-01-02"));
        assert_eq!(r.end_used, d("2024-01-05"));
        assert!((r.return_percent - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_arithmetic_return_round_trip_twenty_percent() {
        let s = PriceSeries::from_points(vec![
            (d("2024-01-01"), 100.0),
            (d("2024-02-01"), 120.0),
        ]);
        let r = arithmetic_return(&s, d("2024-01-01"), d("2024-02-01")).unwrap();
        assert!((r.return_percent - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_arithmetic_return_anchors_to_prior_days() {
        // Requested dates fall on a Saturday/Sunday gap
        let r = arithmetic_return(&series(), d("2024-01-06"), d("2024-01-07")).unwrap();
        assert_eq!(r.start_used, d("2024-01-05"));
        assert_eq!(r.end_used, d("2024-01-05"));
        assert!((r.return_percent - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_arithmetic_return_rejects_inverted_range() {
        let err = arithmetic_return(&series(), d("2024-01-05"), d("2024-01-02")).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidInput(_)));
    }

    #[test]
    fn test_arithmetic_return_missing_start_anchor() {
        let err = arithmetic_return(&series(), d("2023-12-01"), d("2024-01-05")).unwrap_err();
        match err {
            AnalyticsError::NotFound(msg) => assert!(msg.contains("start")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_cumulative_starts_at_exactly_zero() {
        let c = cumulative_returns(&series(), d("2024-01-02"), None).unwrap();
        assert_eq!(c.series[0], (d("2024-01-02"), 0.0));
        assert_eq!(c.series.len(), 5);
        let (last_date, last_ret) = *c.series.last().unwrap();
        assert_eq!(last_date, d("2024-01-08"));
        assert!((last_ret - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_cumulative_truncates_to_end_date() {
        let c = cumulative_returns(&series(), d("2024-01-03"), Some(d("2024-01-05"))).unwrap();
        assert_eq!(c.base_price, 104.0);
        assert_eq!(c.series.len(), 3);
        assert_eq!(c.series[0], (d("2024-01-03"), 0.0));
    }

    #[test]
    fn test_cumulative_no_base_anchor_fails() {
        let err = cumulative_returns(&series(), d("2023-06-01"), None).unwrap_err();
        assert!(matches!(err, AnalyticsError::NotFound(_)));
    }
}

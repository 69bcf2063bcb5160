use chrono::NaiveDate;
use serde::Serialize;
use statrs::statistics::Statistics;

use crate::{AnalyticsError, Frequency, PriceSeries, ReturnMode};

#[derive(Debug, Clone, Serialize)]
pub struct VolatilityReport {
    pub start_requested: NaiveDate,
    pub start_used: NaiveDate,
    pub end_requested: NaiveDate,
    pub end_used: NaiveDate,
    pub frequency: Frequency,
    pub return_mode: ReturnMode,
    pub observations: usize,
    /// Sample standard deviation (ddof = 1) of the period returns.
    pub volatility_period: f64,
    /// `volatility_period * sqrt(annualization_factor)`.
    pub annualized_volatility: f64,
}

/// Annualized volatility of period returns between two anchored dates.
///
/// The series must have been fetched at the same `frequency`: the
/// annualization factor (252 / 52 / 12) is keyed to the sampling interval,
/// not recomputed from the data.
pub fn annualized_volatility(
    series: &PriceSeries,
    start: NaiveDate,
    end: NaiveDate,
    frequency: Frequency,
    return_mode: ReturnMode,
) -> Result<VolatilityReport, AnalyticsError> {
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

    let window = series.window(Some(start_anchor.used), Some(end_anchor.used));
    let returns = period_returns(window, return_mode);
    if returns.len() < 2 {
        return Err(AnalyticsError::InsufficientData(format!(
            "volatility needs at least 2 returns (3 observations), got {} returns",
            returns.len()
        )));
    }

    let volatility_period = returns.as_slice().std_dev();

    Ok(VolatilityReport {
        start_requested: start,
        start_used: start_anchor.used,
        end_requested: end,
        end_used: end_anchor.used,
        frequency,
        return_mode,
        observations: window.len(),
        volatility_period,
        annualized_volatility: volatility_period * frequency.annualization_factor().sqrt(),
    })
}

fn period_returns(window: &[crate::PricePoint], mode: ReturnMode) -> Vec<f64> {
    window
        .windows(2)
        .map(|w| match mode {
            ReturnMode::Log => (w[1].price / w[0].price).ln(),
            ReturnMode::Arithmetic => w[1].price / w[0].price - 1.0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn make_series(prices: &[f64]) -> PriceSeries {
        let base = d("2024-01-01");
        PriceSeries::from_points(
            prices
                .iter()
                .enumerate()
                .map(|(i, &p)| (base + Duration::days(i as i64), p))
                .collect(),
        )
    }

    #[test]
    fn test_daily_annualization_factor() {
        // Alternating +1%/-1% style moves with a known sample std
        let mut prices = vec![100.0];
        for i in 0..20 {
            let last = *prices.last().unwrap();
            let r = if i % 2 == 0 { 0.01 } else { -0.01 };
            prices.push(last * (1.0 + r));
        }
        let series = make_series(&prices);
        let report = annualized_volatility(
            &series,
            d("2024-01-01"),
            d("2024-01-21"),
            Frequency::Daily,
            ReturnMode::Arithmetic,
        )
        .unwrap();
        assert!(
            (report.annualized_volatility
                - report.volatility_period * 252.0_f64.sqrt())
            .abs()
                < 1e-12
        );
        // Sample std of alternating ±0.01 around mean ~0 is close to 0.01
        assert!((report.volatility_period - 0.01).abs() < 1e-3);
        assert!((report.annualized_volatility - 0.1587).abs() < 0.02);
    }

    #[test]
    fn test_weekly_and_monthly_factors() {
        let prices: Vec<f64> = (0..10).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        let series = make_series(&prices);
        let weekly = annualized_volatility(
            &series,
            d("2024-01-01"),
            d("2024-01-10"),
            Frequency::Weekly,
            ReturnMode::Log,
        )
        .unwrap();
        let monthly = annualized_volatility(
            &series,
            d("2024-01-01"),
            d("2024-01-10"),
            Frequency::Monthly,
            ReturnMode::Log,
        )
        .unwrap();
        assert!((weekly.annualized_volatility - weekly.volatility_period * 52.0_f64.sqrt()).abs() < 1e-12);
        assert!((monthly.annualized_volatility - monthly.volatility_period * 12.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_log_returns_of_constant_growth_have_zero_vol() {
        // Constant multiplicative growth: log returns identical, std = 0
        let prices: Vec<f64> = (0..10).map(|i| 100.0 * 1.02_f64.powi(i)).collect();
        let series = make_series(&prices);
        let report = annualized_volatility(
            &series,
            d("2024-01-01"),
            d("2024-01-10"),
            Frequency::Daily,
            ReturnMode::Log,
        )
        .unwrap();
        assert!(report.volatility_period.abs() < 1e-12);
    }

    #[test]
    fn test_arithmetic_vs_log_modes_differ() {
        let series = make_series(&[100.0, 110.0, 95.0, 105.0, 99.0]);
        let log = annualized_volatility(
            &series,
            d("2024-01-01"),
            d("2024-01-05"),
            Frequency::Daily,
            ReturnMode::Log,
        )
        .unwrap();
        let arith = annualized_volatility(
            &series,
            d("2024-01-01"),
            d("2024-01-05"),
            Frequency::Daily,
            ReturnMode::Arithmetic,
        )
        .unwrap();
        assert!((log.volatility_period - arith.volatility_period).abs() > 1e-6);
    }

    #[test]
    fn test_too_few_observations_rejected() {
        let series = make_series(&[100.0, 101.0]);
        let err = annualized_volatility(
            &series,
            d("2024-01-01"),
            d("2024-01-02"),
            Frequency::Daily,
            ReturnMode::Log,
        )
        .unwrap_err();
        assert!(matches!(err, AnalyticsError::InsufficientData(_)));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let series = make_series(&[100.0, 101.0, 102.0, 103.0]);
        let err = annualized_volatility(
            &series,
            d("2024-01-04"),
            d("2024-01-01"),
            Frequency::Daily,
            ReturnMode::Log,
        )
        .unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidInput(_)));
    }
}

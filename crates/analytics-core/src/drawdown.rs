use chrono::NaiveDate;
use serde::Serialize;

use crate::{AnalyticsError, PriceSeries};

/// Minimum observations required for a meaningful drawdown window.
const MIN_OBSERVATIONS: usize = 5;

/// A maximal contiguous run of dates where price sits below the running max.
#[derive(Debug, Clone, Serialize)]
pub struct DrawdownEpisode {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Observation count inside the run.
    pub length: usize,
    /// Most negative drawdown ratio within the run.
    pub trough: f64,
}

/// Peak -> trough -> recovery reconstruction of the worst episode.
#[derive(Debug, Clone, Serialize)]
pub struct WorstEpisodePath {
    pub peak_date: NaiveDate,
    pub peak_price: f64,
    pub trough_date: NaiveDate,
    pub trough_price: f64,
    pub trough_drawdown: f64,
    /// First date at or after the trough where price recovered to the peak
    /// (price >= peak counts as recovered); `None` if it never did.
    pub recovery_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DrawdownReport {
    pub start_used: NaiveDate,
    pub end_used: NaiveDate,
    pub observations: usize,
    /// Minimum drawdown over the whole window (<= 0).
    pub max_drawdown: f64,
    /// Drawdown at the last observation (<= 0).
    pub current_drawdown: f64,
    pub episode_count: usize,
    pub mean_episode_length: Option<f64>,
    pub max_episode_length: Option<usize>,
    /// Minimum trough across all episodes.
    pub worst_trough: Option<f64>,
    pub episodes: Vec<DrawdownEpisode>,
    pub worst_episode: Option<WorstEpisodePath>,
    /// (date, drawdown) per observation, 0.0 at new highs.
    pub series: Vec<(NaiveDate, f64)>,
}

/// Running-maximum-relative drawdown with episode segmentation.
///
/// `start` is anchored nearest-prior (unset means the series start); `end`
/// bounds the window inclusively. Requires at least five observations in the
/// truncated window.
pub fn drawdown_report(
    series: &PriceSeries,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<DrawdownReport, AnalyticsError> {
    if let (Some(s), Some(e)) = (start, end) {
        if e < s {
            return Err(AnalyticsError::InvalidInput(format!(
                "end date {e} is before start date {s}"
            )));
        }
    }

    let from = match start {
        Some(s) => Some(
            series
                .anchor(Some(s))
                .ok_or_else(|| {
                    AnalyticsError::NotFound(format!("no observation on or before start date {s}"))
                })?
                .used,
        ),
        None => None,
    };

    let window = series.window(from, end);
    if window.len() < MIN_OBSERVATIONS {
        return Err(AnalyticsError::InsufficientData(format!(
            "drawdown needs at least {MIN_OBSERVATIONS} observations, got {}",
            window.len()
        )));
    }

    // dd[t] = price[t] / max(price[0..=t]) - 1
    let mut dd = Vec::with_capacity(window.len());
    let mut running_max = f64::MIN;
    for p in window {
        running_max = running_max.max(p.price);
        dd.push((p.date, p.price / running_max - 1.0));
    }

    // Episodes: maximal runs of dd < 0. A new all-time high (dd == 0) ends
    // the run immediately.
    let mut episodes: Vec<DrawdownEpisode> = Vec::new();
    let mut run_start: Option<usize> = None;
    for (i, &(_, value)) in dd.iter().enumerate() {
        if value < 0.0 {
            run_start.get_or_insert(i);
        } else if let Some(s) = run_start.take() {
            episodes.push(build_episode(&dd[s..i]));
        }
    }
    if let Some(s) = run_start {
        episodes.push(build_episode(&dd[s..]));
    }

    let max_drawdown = dd
        .iter()
        .map(|&(_, v)| v)
        .fold(0.0_f64, f64::min);
    let current_drawdown = dd.last().map(|&(_, v)| v).unwrap_or(0.0);

    let mean_episode_length = if episodes.is_empty() {
        None
    } else {
        Some(episodes.iter().map(|e| e.length).sum::<usize>() as f64 / episodes.len() as f64)
    };
    let max_episode_length = episodes.iter().map(|e| e.length).max();
    let worst_trough = episodes
        .iter()
        .map(|e| e.trough)
        .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.min(t))));

    let worst_episode = worst_episode_path(window, &dd);

    Ok(DrawdownReport {
        start_used: window[0].date,
        end_used: window[window.len() - 1].date,
        observations: window.len(),
        max_drawdown,
        current_drawdown,
        episode_count: episodes.len(),
        mean_episode_length,
        max_episode_length,
        worst_trough,
        episodes,
        worst_episode,
        series: dd,
    })
}

fn build_episode(run: &[(NaiveDate, f64)]) -> DrawdownEpisode {
    let trough = run.iter().map(|&(_, v)| v).fold(f64::MAX, f64::min);
    DrawdownEpisode {
        start: run[0].0,
        end: run[run.len() - 1].0,
        length: run.len(),
        trough,
    }
}

/// Reconstruct the peak/trough/recovery path around the global trough.
fn worst_episode_path(
    window: &[crate::PricePoint],
    dd: &[(NaiveDate, f64)],
) -> Option<WorstEpisodePath> {
    if dd.is_empty() {
        return None;
    }

    // First index achieving the global minimum drawdown
    let mut trough_idx = 0;
    for (i, &(_, v)) in dd.iter().enumerate() {
        if v < dd[trough_idx].1 {
            trough_idx = i;
        }
    }
    let (trough_date, trough_dd) = dd[trough_idx];
    if trough_dd >= 0.0 {
        // The window never left its running max; there is no episode to trace
        return None;
    }

    // Peak: latest date at or before the trough achieving the prior maximum
    let peak_price = window[..=trough_idx]
        .iter()
        .map(|p| p.price)
        .fold(f64::MIN, f64::max);
    let peak_idx = window[..=trough_idx]
        .iter()
        .rposition(|p| p.price == peak_price)?;

    // Recovery: first date at or after the trough back at (or above) the peak
    let recovery_date = window[trough_idx..]
        .iter()
        .find(|p| p.price >= peak_price)
        .map(|p| p.date);

    Some(WorstEpisodePath {
        peak_date: window[peak_idx].date,
        peak_price,
        trough_date,
        trough_price: window[trough_idx].price,
        trough_drawdown: trough_dd,
        recovery_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn make_series(prices: &[f64]) -> PriceSeries {
        let base = d("2024-01-01");
        PriceSeries::from_points(
            prices
                .iter()
                .enumerate()
                .map(|(i, &p)| (base + chrono::Duration::days(i as i64), p))
                .collect(),
        )
    }

    #[test]
    fn test_drawdown_nonpositive_and_zero_at_highs() {
        let series = make_series(&[100.0, 110.0, 105.0, 95.0, 115.0, 112.0]);
        let report = drawdown_report(&series, None, None).unwrap();
        for &(_, v) in &report.series {
            assert!(v <= 0.0);
        }
        // New highs at indices 0, 1, 4
        assert_eq!(report.series[0].1, 0.0);
        assert_eq!(report.series[1].1, 0.0);
        assert_eq!(report.series[4].1, 0.0);
        assert!(report.series[2].1 < 0.0);
    }

    #[test]
    fn test_max_and_current_drawdown() {
        let series = make_series(&[100.0, 110.0, 105.0, 95.0, 115.0, 112.0]);
        let report = drawdown_report(&series, None, None).unwrap();
        // Worst point: 95 against peak 110
        assert!((report.max_drawdown - (95.0 / 110.0 - 1.0)).abs() < 1e-12);
        // Last point: 112 against peak 115
        assert!((report.current_drawdown - (112.0 / 115.0 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_episode_segmentation_breaks_on_new_high() {
        // Two separate dips: [105, 95] and [112]
        let series = make_series(&[100.0, 110.0, 105.0, 95.0, 115.0, 112.0]);
        let report = drawdown_report(&series, None, None).unwrap();
        assert_eq!(report.episode_count, 2);

        let first = &report.episodes[0];
        assert_eq!(first.start, d("2024-01-03"));
        assert_eq!(first.end, d("2024-01-04"));
        assert_eq!(first.length, 2);
        assert!((first.trough - (95.0 / 110.0 - 1.0)).abs() < 1e-12);

        let second = &report.episodes[1];
        assert_eq!(second.length, 1);

        assert_eq!(report.max_episode_length, Some(2));
        assert!((report.mean_episode_length.unwrap() - 1.5).abs() < 1e-12);
        assert!((report.worst_trough.unwrap() - (95.0 / 110.0 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_episode_ends_on_equaling_prior_peak() {
        // Price returns exactly to the prior peak: run must end there
        let series = make_series(&[100.0, 90.0, 95.0, 100.0, 98.0]);
        let report = drawdown_report(&series, None, None).unwrap();
        assert_eq!(report.episode_count, 2);
        assert_eq!(report.episodes[0].end, d("2024-01-03"));
        assert_eq!(report.series[3].1, 0.0);
    }

    #[test]
    fn test_worst_episode_path_with_recovery() {
        let series = make_series(&[100.0, 120.0, 110.0, 90.0, 105.0, 120.0, 125.0]);
        let report = drawdown_report(&series, None, None).unwrap();
        let path = report.worst_episode.unwrap();
        assert_eq!(path.peak_date, d("2024-01-02"));
        assert_eq!(path.peak_price, 120.0);
        assert_eq!(path.trough_date, d("2024-01-04"));
        assert_eq!(path.trough_price, 90.0);
        // Recovery on equaling the peak, 2024-01-06
        assert_eq!(path.recovery_date, Some(d("2024-01-06")));
    }

    #[test]
    fn test_worst_episode_path_without_recovery() {
        let series = make_series(&[100.0, 120.0, 110.0, 90.0, 95.0]);
        let report = drawdown_report(&series, None, None).unwrap();
        let path = report.worst_episode.unwrap();
        assert_eq!(path.trough_date, d("2024-01-04"));
        assert!(path.recovery_date.is_none());
    }

    #[test]
    fn test_monotonic_rise_has_no_episodes() {
        let series = make_series(&[100.0, 101.0, 102.0, 103.0, 104.0]);
        let report = drawdown_report(&series, None, None).unwrap();
        assert_eq!(report.episode_count, 0);
        assert_eq!(report.max_drawdown, 0.0);
        assert!(report.worst_episode.is_none());
        assert!(report.mean_episode_length.is_none());
    }

    #[test]
    fn test_insufficient_data_rejected() {
        let series = make_series(&[100.0, 95.0, 105.0]);
        let err = drawdown_report(&series, None, None).unwrap_err();
        assert!(matches!(err, AnalyticsError::InsufficientData(_)));
    }

    #[test]
    fn test_window_truncation_resets_running_max() {
        // Full series peaks at 200 early; truncated window must not see it
        let series = make_series(&[200.0, 100.0, 110.0, 105.0, 120.0, 115.0, 130.0]);
        let report = drawdown_report(&series, Some(d("2024-01-02")), None).unwrap();
        assert_eq!(report.start_used, d("2024-01-02"));
        assert_eq!(report.series[0].1, 0.0);
        // Max drawdown inside the window: 105 vs 110
        assert!((report.max_drawdown - (105.0 / 110.0 - 1.0)).abs() < 1e-12);
    }
}

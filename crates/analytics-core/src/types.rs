use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// A single daily (or weekly/monthly) observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Ordered price history for one ticker, strictly increasing dates.
///
/// Built fresh per request from the upstream fetch; missing observations are
/// dropped at construction, never zero-filled.
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series from raw (date, price) pairs.
    ///
    /// Non-finite and non-positive prices are dropped. Input is sorted by
    /// date; duplicate dates keep the last value seen.
    pub fn from_points(raw: Vec<(NaiveDate, f64)>) -> Self {
        let mut points: Vec<PricePoint> = raw
            .into_iter()
            .filter(|(_, p)| p.is_finite() && *p > 0.0)
            .map(|(date, price)| PricePoint { date, price })
            .collect();
        points.sort_by_key(|p| p.date);
        points.dedup_by(|next, prev| {
            if next.date == prev.date {
                prev.price = next.price;
                true
            } else {
                false
            }
        });
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Resolve a requested date to the latest observation on or before it.
    ///
    /// `None` target means "the most recent observation". Returns `None` when
    /// no observation exists at or before the target; callers surface that as
    /// a per-ticker error, not a panic.
    pub fn anchor(&self, target: Option<NaiveDate>) -> Option<DateAnchor> {
        let idx = match target {
            None => self.points.len().checked_sub(1)?,
            Some(t) => self.points.partition_point(|p| p.date <= t).checked_sub(1)?,
        };
        let point = self.points[idx];
        Some(DateAnchor {
            requested: target,
            used: point.date,
            price: point.price,
        })
    }

    /// Observations in `[from, to]`; an unset bound is open on that side.
    pub fn window(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> &[PricePoint] {
        let lo = match from {
            Some(d) => self.points.partition_point(|p| p.date < d),
            None => 0,
        };
        let hi = match to {
            Some(d) => self.points.partition_point(|p| p.date <= d),
            None => self.points.len(),
        };
        if lo >= hi {
            &[]
        } else {
            &self.points[lo..hi]
        }
    }
}

/// Result of resolving a requested date against a series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DateAnchor {
    pub requested: Option<NaiveDate>,
    pub used: NaiveDate,
    pub price: f64,
}

/// Named trailing lookback windows for the performance table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnWindow {
    OneDay,
    OneWeek,
    OneMonth,
    YearToDate,
    OneYear,
    ThreeYears,
    FiveYears,
}

impl ReturnWindow {
    pub const ALL: [ReturnWindow; 7] = [
        ReturnWindow::OneDay,
        ReturnWindow::OneWeek,
        ReturnWindow::OneMonth,
        ReturnWindow::YearToDate,
        ReturnWindow::OneYear,
        ReturnWindow::ThreeYears,
        ReturnWindow::FiveYears,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ReturnWindow::OneDay => "1D",
            ReturnWindow::OneWeek => "1W",
            ReturnWindow::OneMonth => "1M",
            ReturnWindow::YearToDate => "YTD",
            ReturnWindow::OneYear => "1Y",
            ReturnWindow::ThreeYears => "3Y",
            ReturnWindow::FiveYears => "5Y",
        }
    }

    /// Calendar date this window looks back to, relative to the last anchor.
    ///
    /// Fixed day-count subtraction for every window except YTD, which anchors
    /// to January 1 of the anchor's year.
    pub fn target_date(&self, anchor: NaiveDate) -> NaiveDate {
        match self {
            ReturnWindow::OneDay => anchor - Duration::days(1),
            ReturnWindow::OneWeek => anchor - Duration::days(7),
            ReturnWindow::OneMonth => anchor - Duration::days(30),
            ReturnWindow::YearToDate => {
                NaiveDate::from_ymd_opt(anchor.year(), 1, 1).unwrap_or(anchor)
            }
            ReturnWindow::OneYear => anchor - Duration::days(365),
            ReturnWindow::ThreeYears => anchor - Duration::days(365 * 3),
            ReturnWindow::FiveYears => anchor - Duration::days(365 * 5),
        }
    }
}

/// Sampling frequency of the fetched series.
///
/// The annualization factor must match the interval the series was fetched
/// at; mixing a weekly fetch with the daily factor is a caller bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn annualization_factor(&self) -> f64 {
        match self {
            Frequency::Daily => 252.0,
            Frequency::Weekly => 52.0,
            Frequency::Monthly => 12.0,
        }
    }

    /// Interval code understood by the Yahoo chart endpoint.
    pub fn interval_code(&self) -> &'static str {
        match self {
            Frequency::Daily => "1d",
            Frequency::Weekly => "1wk",
            Frequency::Monthly => "1mo",
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = crate::AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            other => Err(crate::AnalyticsError::InvalidInput(format!(
                "unknown frequency '{other}' (expected daily, weekly or monthly)"
            ))),
        }
    }
}

/// How period returns are computed for volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnMode {
    Log,
    Arithmetic,
}

impl std::str::FromStr for ReturnMode {
    type Err = crate::AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "log" => Ok(ReturnMode::Log),
            "arithmetic" => Ok(ReturnMode::Arithmetic),
            other => Err(crate::AnalyticsError::InvalidInput(format!(
                "unknown return mode '{other}' (expected log or arithmetic)"
            ))),
        }
    }
}

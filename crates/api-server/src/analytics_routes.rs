use analytics_core::{
    annualized_volatility, arithmetic_return, cumulative_returns, drawdown_report,
    performance_asof, AnalyticsError, ArithmeticReturn, CumulativeReturns, DrawdownReport,
    Frequency, PerformanceTable, PriceSeries, ReturnMode, ReturnWindow, VolatilityReport,
};
use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::{AppError, AppState};

const MAX_TICKERS: usize = 500;
/// History depth fetched for the trailing performance table (covers 5Y + the
/// anchoring slack around it).
const PERF_LOOKBACK_DAYS: i64 = 3700;
/// Extra days fetched before a requested start so the nearest-prior anchor
/// has something to land on.
const ANCHOR_BUFFER_DAYS: i64 = 30;

/// Batch envelope: per-ticker rows plus per-ticker failures. One ticker's
/// error never aborts the batch.
#[derive(Serialize)]
pub struct BatchResponse<T> {
    pub data: Vec<T>,
    pub errors: BTreeMap<String, String>,
}

#[derive(Serialize)]
pub struct PerformanceRow {
    pub ticker: String,
    #[serde(flatten)]
    pub table: PerformanceTable,
}

#[derive(Serialize)]
pub struct ReturnRow {
    pub ticker: String,
    #[serde(flatten)]
    pub result: ArithmeticReturn,
}

#[derive(Serialize)]
pub struct CumulativeRow {
    pub ticker: String,
    #[serde(flatten)]
    pub result: CumulativeReturns,
}

#[derive(Serialize)]
pub struct DrawdownRow {
    pub ticker: String,
    #[serde(flatten)]
    pub report: DrawdownReport,
}

#[derive(Serialize)]
pub struct VolatilityRow {
    pub ticker: String,
    #[serde(flatten)]
    pub report: VolatilityReport,
    pub price_type: String,
}

#[derive(Deserialize)]
pub struct PerformanceQuery {
    pub tickers: String,
    pub asof: Option<String>,
    pub adjusted: Option<bool>,
    pub format: Option<String>,
}

#[derive(Deserialize)]
pub struct PerformanceBody {
    pub tickers: Vec<String>,
    pub asof: Option<String>,
    pub adjusted: Option<bool>,
    pub format: Option<String>,
}

#[derive(Deserialize)]
pub struct ReturnQuery {
    pub tickers: String,
    pub start: String,
    pub end: String,
    pub adjusted: Option<bool>,
    pub format: Option<String>,
}

#[derive(Deserialize)]
pub struct CumulativeQuery {
    pub tickers: String,
    pub start: String,
    pub end: Option<String>,
    pub adjusted: Option<bool>,
    pub format: Option<String>,
}

#[derive(Deserialize)]
pub struct DrawdownQuery {
    pub tickers: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub adjusted: Option<bool>,
    pub include_series: Option<bool>,
    pub format: Option<String>,
}

#[derive(Deserialize)]
pub struct VolatilityQuery {
    pub tickers: String,
    pub start: String,
    pub end: String,
    pub frequency: Option<String>,
    pub return_mode: Option<String>,
    pub adjusted: Option<bool>,
    pub format: Option<String>,
}

pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analytics/performance", get(performance_get))
        .route("/api/analytics/performance", post(performance_post))
        .route("/api/analytics/return", get(arithmetic_return_get))
        .route("/api/analytics/cumulative", get(cumulative_get))
        .route("/api/analytics/drawdown", get(drawdown_get))
        .route("/api/analytics/volatility", get(volatility_get))
}

// ---- request parsing ----

fn parse_tickers(raw: &str) -> Result<Vec<String>, AnalyticsError> {
    let mut tickers: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let t = part.trim().to_uppercase();
        if !t.is_empty() && !tickers.contains(&t) {
            tickers.push(t);
        }
    }
    validate_ticker_list(&tickers)?;
    Ok(tickers)
}

fn validate_ticker_list(tickers: &[String]) -> Result<(), AnalyticsError> {
    if tickers.is_empty() {
        return Err(AnalyticsError::InvalidInput("tickers is required".to_string()));
    }
    if tickers.len() > MAX_TICKERS {
        return Err(AnalyticsError::InvalidInput(format!(
            "too many tickers ({}, max {MAX_TICKERS})",
            tickers.len()
        )));
    }
    Ok(())
}

fn parse_date(raw: &str) -> Result<NaiveDate, AnalyticsError> {
    raw.parse()
        .map_err(|_| AnalyticsError::InvalidInput(format!("invalid date '{raw}' (expected YYYY-MM-DD)")))
}

fn parse_date_opt(raw: &Option<String>) -> Result<Option<NaiveDate>, AnalyticsError> {
    raw.as_deref().map(parse_date).transpose()
}

fn check_range(start: NaiveDate, end: NaiveDate) -> Result<(), AnalyticsError> {
    if end < start {
        return Err(AnalyticsError::InvalidInput(format!(
            "end date {end} is before start date {start}"
        )));
    }
    Ok(())
}

fn price_type_label(adjusted: bool) -> &'static str {
    if adjusted {
        "adjusted_close"
    } else {
        "close"
    }
}

// ---- batch plumbing ----

async fn fetch_series(
    state: &AppState,
    tickers: &[String],
    start: NaiveDate,
    end: NaiveDate,
    frequency: Frequency,
    adjusted: bool,
) -> Result<HashMap<String, PriceSeries>, AppError> {
    // One upstream fetch per batch; failures here abort the whole request
    let map = state
        .market
        .history(tickers, start, end, frequency, adjusted)
        .await?;
    Ok(map)
}

/// Run one computation per ticker, folding failures into the errors map.
fn per_ticker<T>(
    tickers: &[String],
    series_map: &HashMap<String, PriceSeries>,
    compute: impl Fn(&str, &PriceSeries) -> Result<T, AnalyticsError>,
) -> BatchResponse<T> {
    let mut data = Vec::new();
    let mut errors = BTreeMap::new();

    for ticker in tickers {
        let series = series_map.get(ticker);
        match series {
            None => {
                errors.insert(ticker.clone(), format!("no data for ticker '{ticker}'"));
            }
            Some(s) if s.is_empty() => {
                errors.insert(ticker.clone(), format!("no data for ticker '{ticker}'"));
            }
            Some(s) => match compute(ticker, s) {
                Ok(row) => data.push(row),
                Err(e) => {
                    errors.insert(ticker.clone(), e.to_string());
                }
            },
        }
    }

    BatchResponse { data, errors }
}

// ---- CSV rendering ----

fn csv_response(
    filename: &str,
    header_row: &[&str],
    rows: Vec<Vec<String>>,
) -> Result<Response, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header_row).map_err(anyhow::Error::from)?;
    for row in rows {
        writer.write_record(&row).map_err(anyhow::Error::from)?;
    }
    let body = writer.into_inner().map_err(anyhow::Error::from)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={filename}"),
            ),
        ],
        body,
    )
        .into_response())
}

fn wants_csv(format: &Option<String>) -> Result<bool, AnalyticsError> {
    match format.as_deref() {
        None | Some("json") => Ok(false),
        Some("csv") => Ok(true),
        Some(other) => Err(AnalyticsError::InvalidInput(format!(
            "unknown format '{other}' (expected json or csv)"
        ))),
    }
}

fn fmt_opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

// ---- handlers ----

async fn performance_get(
    State(state): State<AppState>,
    Query(query): Query<PerformanceQuery>,
) -> Result<Response, AppError> {
    let tickers = parse_tickers(&query.tickers)?;
    let asof = parse_date_opt(&query.asof)?;
    run_performance(
        &state,
        tickers,
        asof,
        query.adjusted.unwrap_or(true),
        wants_csv(&query.format)?,
    )
    .await
}

async fn performance_post(
    State(state): State<AppState>,
    Json(body): Json<PerformanceBody>,
) -> Result<Response, AppError> {
    let tickers: Vec<String> = body
        .tickers
        .iter()
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect();
    validate_ticker_list(&tickers)?;
    let asof = parse_date_opt(&body.asof)?;
    run_performance(
        &state,
        tickers,
        asof,
        body.adjusted.unwrap_or(true),
        wants_csv(&body.format)?,
    )
    .await
}

async fn run_performance(
    state: &AppState,
    tickers: Vec<String>,
    asof: Option<NaiveDate>,
    adjusted: bool,
    csv: bool,
) -> Result<Response, AppError> {
    let end = asof.unwrap_or_else(|| Utc::now().date_naive());
    let start = end - Duration::days(PERF_LOOKBACK_DAYS);
    let series_map = fetch_series(state, &tickers, start, end, Frequency::Daily, adjusted).await?;

    let batch = per_ticker(&tickers, &series_map, |ticker, series| {
        Ok(PerformanceRow {
            ticker: ticker.to_string(),
            table: performance_asof(series, asof)?,
        })
    });

    if csv {
        let mut header_row = vec!["ticker", "asof_requested", "asof_used", "last"];
        header_row.extend(ReturnWindow::ALL.iter().map(|w| w.label()));
        let rows = batch
            .data
            .iter()
            .map(|row| {
                let mut out = vec![
                    row.ticker.clone(),
                    fmt_opt(&row.table.asof_requested),
                    row.table.asof_used.to_string(),
                    row.table.last.to_string(),
                ];
                for window in ReturnWindow::ALL {
                    out.push(fmt_opt(&row.table.perf[window.label()]));
                }
                out
            })
            .collect();
        return csv_response("performance.csv", &header_row, rows);
    }

    Ok(Json(batch).into_response())
}

async fn arithmetic_return_get(
    State(state): State<AppState>,
    Query(query): Query<ReturnQuery>,
) -> Result<Response, AppError> {
    let tickers = parse_tickers(&query.tickers)?;
    let start = parse_date(&query.start)?;
    let end = parse_date(&query.end)?;
    check_range(start, end)?;
    let adjusted = query.adjusted.unwrap_or(true);

    let fetch_start = start - Duration::days(ANCHOR_BUFFER_DAYS);
    let series_map =
        fetch_series(&state, &tickers, fetch_start, end, Frequency::Daily, adjusted).await?;

    let batch = per_ticker(&tickers, &series_map, |ticker, series| {
        Ok(ReturnRow {
            ticker: ticker.to_string(),
            result: arithmetic_return(series, start, end)?,
        })
    });

    if wants_csv(&query.format)? {
        let rows = batch
            .data
            .iter()
            .map(|row| {
                vec![
                    row.ticker.clone(),
                    row.result.start_requested.to_string(),
                    row.result.start_used.to_string(),
                    row.result.start_price.to_string(),
                    row.result.end_requested.to_string(),
                    row.result.end_used.to_string(),
                    row.result.end_price.to_string(),
                    row.result.return_percent.to_string(),
                ]
            })
            .collect();
        return csv_response(
            "arithmetic_return.csv",
            &[
                "ticker",
                "start_requested",
                "start_used",
                "start_price",
                "end_requested",
                "end_used",
                "end_price",
                "return_percent",
            ],
            rows,
        );
    }

    Ok(Json(batch).into_response())
}

async fn cumulative_get(
    State(state): State<AppState>,
    Query(query): Query<CumulativeQuery>,
) -> Result<Response, AppError> {
    let tickers = parse_tickers(&query.tickers)?;
    let start = parse_date(&query.start)?;
    let end = parse_date_opt(&query.end)?;
    if let Some(e) = end {
        check_range(start, e)?;
    }
    let adjusted = query.adjusted.unwrap_or(true);

    let fetch_start = start - Duration::days(ANCHOR_BUFFER_DAYS);
    let fetch_end = end.unwrap_or_else(|| Utc::now().date_naive());
    let series_map =
        fetch_series(&state, &tickers, fetch_start, fetch_end, Frequency::Daily, adjusted).await?;

    let batch = per_ticker(&tickers, &series_map, |ticker, series| {
        Ok(CumulativeRow {
            ticker: ticker.to_string(),
            result: cumulative_returns(series, start, end)?,
        })
    });

    if wants_csv(&query.format)? {
        // Long format: one row per observation
        let rows = batch
            .data
            .iter()
            .flat_map(|row| {
                row.result.series.iter().map(|(date, value)| {
                    vec![row.ticker.clone(), date.to_string(), value.to_string()]
                })
            })
            .collect();
        return csv_response(
            "cumulative_returns.csv",
            &["ticker", "date", "cumulative_return"],
            rows,
        );
    }

    Ok(Json(batch).into_response())
}

async fn drawdown_get(
    State(state): State<AppState>,
    Query(query): Query<DrawdownQuery>,
) -> Result<Response, AppError> {
    let tickers = parse_tickers(&query.tickers)?;
    let start = parse_date_opt(&query.start)?;
    let end = parse_date_opt(&query.end)?;
    if let (Some(s), Some(e)) = (start, end) {
        check_range(s, e)?;
    }
    let adjusted = query.adjusted.unwrap_or(true);
    let include_series = query.include_series.unwrap_or(false);

    let fetch_end = end.unwrap_or_else(|| Utc::now().date_naive());
    let fetch_start = match start {
        Some(s) => s - Duration::days(ANCHOR_BUFFER_DAYS),
        None => fetch_end - Duration::days(PERF_LOOKBACK_DAYS),
    };
    let series_map =
        fetch_series(&state, &tickers, fetch_start, fetch_end, Frequency::Daily, adjusted).await?;

    let batch = per_ticker(&tickers, &series_map, |ticker, series| {
        Ok(DrawdownRow {
            ticker: ticker.to_string(),
            report: drawdown_report(series, start, end)?,
        })
    });

    if wants_csv(&query.format)? {
        // Long format over the drawdown series
        let rows = batch
            .data
            .iter()
            .flat_map(|row| {
                row.report.series.iter().map(|(date, value)| {
                    vec![row.ticker.clone(), date.to_string(), value.to_string()]
                })
            })
            .collect();
        return csv_response("drawdown.csv", &["ticker", "date", "drawdown"], rows);
    }

    let batch = if include_series {
        batch
    } else {
        BatchResponse {
            data: batch
                .data
                .into_iter()
                .map(|mut row| {
                    row.report.series = Vec::new();
                    row
                })
                .collect(),
            errors: batch.errors,
        }
    };

    Ok(Json(batch).into_response())
}

async fn volatility_get(
    State(state): State<AppState>,
    Query(query): Query<VolatilityQuery>,
) -> Result<Response, AppError> {
    let tickers = parse_tickers(&query.tickers)?;
    let start = parse_date(&query.start)?;
    let end = parse_date(&query.end)?;
    check_range(start, end)?;
    let frequency: Frequency = query
        .frequency
        .as_deref()
        .unwrap_or("daily")
        .parse()?;
    let return_mode: ReturnMode = query
        .return_mode
        .as_deref()
        .unwrap_or("log")
        .parse()?;
    let adjusted = query.adjusted.unwrap_or(true);

    // The fetch interval matches the annualization factor by construction
    let fetch_start = start - Duration::days(ANCHOR_BUFFER_DAYS);
    let series_map = fetch_series(&state, &tickers, fetch_start, end, frequency, adjusted).await?;

    let batch = per_ticker(&tickers, &series_map, |ticker, series| {
        Ok(VolatilityRow {
            ticker: ticker.to_string(),
            report: annualized_volatility(series, start, end, frequency, return_mode)?,
            price_type: price_type_label(adjusted).to_string(),
        })
    });

    if wants_csv(&query.format)? {
        let rows = batch
            .data
            .iter()
            .map(|row| {
                vec![
                    row.ticker.clone(),
                    row.report.start_used.to_string(),
                    row.report.end_used.to_string(),
                    format!("{:?}", row.report.frequency).to_lowercase(),
                    format!("{:?}", row.report.return_mode).to_lowercase(),
                    row.report.observations.to_string(),
                    row.report.volatility_period.to_string(),
                    row.report.annualized_volatility.to_string(),
                    row.price_type.clone(),
                ]
            })
            .collect();
        return csv_response(
            "volatility.csv",
            &[
                "ticker",
                "start_used",
                "end_used",
                "frequency",
                "return_mode",
                "observations",
                "volatility_period",
                "annualized_volatility",
                "price_type",
            ],
            rows,
        );
    }

    Ok(Json(batch).into_response())
}

//! Sales report handlers with JSON and CSV output

use axum::{
    extract::{Query, State},
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::{DateRange, ReportPeriod};

use crate::error::{AppError, AppResult};
use crate::services::reporting::{
    csv_rows, default_range, CsvRow, ReportOutcome, ReportRequest, ReportService,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SalesReportQuery {
    /// today, daily, weekly or monthly; defaults to daily
    pub period: Option<String>,
    /// RFC 3339 instant or `YYYY-MM-DD` (start of that day)
    pub start: Option<String>,
    /// RFC 3339 instant (exclusive) or `YYYY-MM-DD` (inclusive day)
    pub end: Option<String>,
    pub include_inactive_locations: Option<bool>,
    pub nocache: Option<bool>,
    pub format: Option<String>, // "json" or "csv"
}

#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub cleared: usize,
}

/// Full report bundle
pub async fn get_sales_report(
    State(state): State<AppState>,
    Query(query): Query<SalesReportQuery>,
) -> AppResult<Response> {
    let csv = wants_csv(&query)?;
    let outcome = run_report(&state.reports, &query).await?;

    if csv {
        let data = ReportService::export_to_csv(&csv_rows(&outcome.bundle))?;
        return Ok(csv_response(&outcome, "sales_report.csv", data));
    }
    let bundle = outcome.bundle.clone();
    Ok(with_run_headers(&outcome, Json(bundle.as_ref()).into_response()))
}

/// Rows that need reordering, most urgent first
pub async fn get_reorder_report(
    State(state): State<AppState>,
    Query(query): Query<SalesReportQuery>,
) -> AppResult<Response> {
    let csv = wants_csv(&query)?;
    let outcome = run_report(&state.reports, &query).await?;

    if csv {
        let rows: Vec<_> = outcome
            .bundle
            .rop_rows
            .iter()
            .map(CsvRow::from)
            .collect();
        let data = ReportService::export_to_csv(&rows)?;
        return Ok(csv_response(&outcome, "reorder.csv", data));
    }
    let response = Json(&outcome.bundle.rop_rows).into_response();
    Ok(with_run_headers(&outcome, response))
}

/// Stocked variants with no recent sales
pub async fn get_dead_stock_report(
    State(state): State<AppState>,
    Query(query): Query<SalesReportQuery>,
) -> AppResult<Response> {
    let csv = wants_csv(&query)?;
    let outcome = run_report(&state.reports, &query).await?;

    if csv {
        let data = ReportService::export_to_csv(&outcome.bundle.dead_stock)?;
        return Ok(csv_response(&outcome, "dead_stock.csv", data));
    }

    #[derive(Serialize)]
    struct DeadStockBody<'a> {
        #[serde(flatten)]
        status: &'a shared::DeadStockStatus,
        items: &'a [shared::DeadStockItem],
    }
    let response = Json(DeadStockBody {
        status: &outcome.bundle.dead_stock_status,
        items: &outcome.bundle.dead_stock,
    })
    .into_response();
    Ok(with_run_headers(&outcome, response))
}

/// Drop every cached report
pub async fn clear_report_cache(State(state): State<AppState>) -> Json<ClearCacheResponse> {
    Json(ClearCacheResponse {
        cleared: state.reports.clear_cache(),
    })
}

async fn run_report(reports: &ReportService, query: &SalesReportQuery) -> AppResult<ReportOutcome> {
    let period = match query.period.as_deref() {
        Some(raw) => raw.parse::<ReportPeriod>().map_err(AppError::InvalidRequest)?,
        None => ReportPeriod::Daily,
    };
    let range = resolve_range(
        period,
        query.start.as_deref(),
        query.end.as_deref(),
        reports.now(),
    )?;

    reports
        .run(ReportRequest {
            period,
            range,
            include_inactive_locations: query.include_inactive_locations,
            bypass_cache: query.nocache.unwrap_or(false),
        })
        .await
}

fn wants_csv(query: &SalesReportQuery) -> AppResult<bool> {
    match query.format.as_deref() {
        None | Some("json") => Ok(false),
        Some("csv") => Ok(true),
        Some(other) => Err(AppError::InvalidRequest(format!("unsupported format: {}", other))),
    }
}

/// Explicit bounds when both are given, else the period's default range
pub fn resolve_range(
    period: ReportPeriod,
    start: Option<&str>,
    end: Option<&str>,
    now: DateTime<Utc>,
) -> AppResult<DateRange> {
    let range = match (start, end) {
        (Some(start), Some(end)) => DateRange::new(parse_bound(start, false)?, parse_bound(end, true)?),
        (None, None) => default_range(period, now),
        _ => {
            return Err(AppError::InvalidRequest(
                "start and end must be given together".to_string(),
            ))
        }
    };

    if range.is_empty() {
        return Err(AppError::InvalidRequest(format!(
            "start {} is not before end {}",
            range.start, range.end
        )));
    }
    Ok(range)
}

fn parse_bound(raw: &str, is_end: bool) -> AppResult<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }

    let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::InvalidRequest(format!("invalid date: {}", raw)))?;
    let midnight = day
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| AppError::InvalidRequest(format!("invalid date: {}", raw)))?;

    Ok(if is_end { midnight + Duration::days(1) } else { midnight })
}

fn csv_response(outcome: &ReportOutcome, filename: &str, data: String) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", filename);
    let mut response = ([(header::CONTENT_TYPE, "text/csv")], data).into_response();
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
    }
    with_run_headers(outcome, response)
}

fn with_run_headers(outcome: &ReportOutcome, mut response: Response) -> Response {
    let headers = response.headers_mut();
    let cache = if outcome.cache_hit { "HIT" } else { "MISS" };
    headers.insert(HeaderName::from_static("x-cache"), HeaderValue::from_static(cache));
    if let Ok(run_id) = HeaderValue::from_str(&outcome.bundle.run_id.to_string()) {
        headers.insert(HeaderName::from_static("x-run-id"), run_id);
    }
    response
}

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

use crate::api::ApiResponse;
use crate::auth::AuthUser;
use crate::error::{internal_error, map_db_error, AppError, AppResult};
use crate::models::MetricType;
use crate::services::kpi::{
    anomaly_report, bucket_series, metric_kpi, overall_kpi, rank_hotspots, scan_daily_anomalies,
    AnomalyData, BucketInterval, HotspotData, KpiSummary, ANOMALY_Z_THRESHOLD, HOTSPOT_LIMIT,
    SPARKLINE_POINTS,
};
use crate::services::readings::{self, ReadingFilter};
use crate::state::AppState;
use crate::time::{resolve_date_range, DateRangeKind, Period};

#[derive(Debug, Clone, Default, serde::Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub(crate) struct KpiQuery {
    date_range: Option<String>,
    unit_id: Option<String>,
    department_id: Option<String>,
    machine_id: Option<String>,
    shift_id: Option<String>,
    interval: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AppliedFilters {
    date_range: DateRangeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    department_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    machine_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shift_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    interval: Option<BucketInterval>,
}

impl AppliedFilters {
    fn readings(&self) -> ReadingFilter {
        ReadingFilter {
            unit_id: self.unit_id,
            department_id: self.department_id,
            machine_id: self.machine_id,
            shift_id: self.shift_id,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct SummaryResponse {
    kpis: Vec<KpiSummary>,
    overall: KpiSummary,
    filters: AppliedFilters,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct TimeSeriesPoint {
    timestamp: String,
    value: f64,
    count: u64,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct Hotspots {
    departments: Vec<HotspotData>,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InsightsResponse {
    metric: MetricType,
    time_series: Vec<TimeSeriesPoint>,
    hotspots: Hotspots,
    anomalies: Vec<AnomalyData>,
    filters: AppliedFilters,
}

#[derive(Debug, serde::Serialize)]
struct CsvRow<'a> {
    metric: &'a str,
    unit: &'a str,
    current_value: f64,
    previous_value: f64,
    delta: f64,
    delta_percentage: f64,
    trend: &'static str,
}

fn parse_id(raw: Option<&str>, field: &str) -> AppResult<Option<Uuid>> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => Uuid::parse_str(value)
            .map(Some)
            .map_err(|_| AppError::bad_request(format!("Invalid {field}"))),
    }
}

/// Validates the query; `default_range` applies when `dateRange` is absent and
/// `default_interval` (insights only) when `interval` is absent.
fn parse_filters(
    query: &KpiQuery,
    default_range: DateRangeKind,
    default_interval: Option<BucketInterval>,
) -> AppResult<AppliedFilters> {
    let date_range = match query.date_range.as_deref() {
        Some(raw) => raw.parse().map_err(AppError::bad_request)?,
        None => default_range,
    };
    let interval = match (default_interval, query.interval.as_deref()) {
        (None, _) => None,
        (Some(_), Some(raw)) => Some(raw.parse().map_err(AppError::bad_request)?),
        (Some(default), None) => Some(default),
    };
    Ok(AppliedFilters {
        date_range,
        unit_id: parse_id(query.unit_id.as_deref(), "unitId")?,
        department_id: parse_id(query.department_id.as_deref(), "departmentId")?,
        machine_id: parse_id(query.machine_id.as_deref(), "machineId")?,
        shift_id: parse_id(query.shift_id.as_deref(), "shiftId")?,
        interval,
    })
}

async fn build_summary(state: &AppState, filters: AppliedFilters) -> AppResult<SummaryResponse> {
    let period = resolve_date_range(filters.date_range, Utc::now());
    let reading_filter = filters.readings();

    let current = readings::metric_sums(&state.db, &reading_filter, &period)
        .await
        .map_err(map_db_error)?;
    let previous = readings::metric_sums(&state.db, &reading_filter, &period.previous())
        .await
        .map_err(map_db_error)?;
    let series = readings::sparkline_values(&state.db, &reading_filter, &period, SPARKLINE_POINTS)
        .await
        .map_err(map_db_error)?;

    let kpis: Vec<KpiSummary> = MetricType::ALL
        .iter()
        .map(|&metric| {
            metric_kpi(
                metric,
                current.get(&metric).copied().unwrap_or(0.0),
                previous.get(&metric).copied().unwrap_or(0.0),
                series.get(&metric).map(Vec::as_slice).unwrap_or(&[]),
            )
        })
        .collect();
    let overall = overall_kpi(&kpis);

    Ok(SummaryResponse {
        kpis,
        overall,
        filters,
    })
}

#[utoipa::path(
    get,
    path = "/api/kpi/summary",
    tag = "kpi",
    params(KpiQuery),
    responses(
        (status = 200, description = "KPI summary for every metric", body = SummaryResponse),
        (status = 400, description = "Invalid query"),
        (status = 401, description = "Unauthorized")
    ),
    security(("HTTPBearer" = []))
)]
pub(crate) async fn summary(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Query(query): Query<KpiQuery>,
) -> AppResult<Json<ApiResponse<SummaryResponse>>> {
    let filters = parse_filters(&query, DateRangeKind::Today, None)?;
    Ok(Json(ApiResponse::ok(build_summary(&state, filters).await?)))
}

fn summary_csv(summary: &SummaryResponse) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for kpi in summary.kpis.iter().chain(std::iter::once(&summary.overall)) {
        writer.serialize(CsvRow {
            metric: &kpi.metric,
            unit: &kpi.unit,
            current_value: kpi.current_value,
            previous_value: kpi.previous_value,
            delta: kpi.delta,
            delta_percentage: kpi.delta_percentage,
            trend: kpi.trend.as_str(),
        })?;
    }
    Ok(writer.into_inner().map_err(|err| err.into_error())?)
}

#[utoipa::path(
    get,
    path = "/api/kpi/summary/export",
    tag = "kpi",
    params(KpiQuery),
    responses(
        (status = 200, description = "KPI summary as CSV", body = String, content_type = "text/csv"),
        (status = 400, description = "Invalid query"),
        (status = 401, description = "Unauthorized")
    ),
    security(("HTTPBearer" = []))
)]
pub(crate) async fn export_summary(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<KpiQuery>,
) -> AppResult<Response> {
    let filters = parse_filters(&query, DateRangeKind::Today, None)?;
    let summary = build_summary(&state, filters).await?;
    let body = summary_csv(&summary).map_err(internal_error)?;
    tracing::info!(user_id = %user.id, date_range = filters.date_range.as_str(), "kpi summary exported");

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::OK;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    let content_disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"kpi-summary-{}.csv\"",
        filters.date_range.as_str()
    ))
    .map_err(internal_error)?;
    response
        .headers_mut()
        .insert(header::CONTENT_DISPOSITION, content_disposition);
    Ok(response)
}

async fn build_insights(
    state: &AppState,
    metric: MetricType,
    filters: AppliedFilters,
    period: Period,
) -> AppResult<InsightsResponse> {
    let reading_filter = filters.readings();
    let interval = filters.interval.unwrap_or(BucketInterval::Day);

    let samples = readings::hourly_samples(&state.db, metric, &reading_filter, &period)
        .await
        .map_err(map_db_error)?;
    let time_series = bucket_series(samples, interval)
        .into_iter()
        .map(|bucket| TimeSeriesPoint {
            timestamp: bucket.start.to_rfc3339(),
            value: bucket.sum,
            count: bucket.count,
        })
        .collect();

    let departments = readings::department_totals(&state.db, metric, &reading_filter, &period)
        .await
        .map_err(map_db_error)?;
    let previous: HashMap<Uuid, f64> =
        readings::department_totals(&state.db, metric, &reading_filter, &period.previous())
            .await
            .map_err(map_db_error)?
            .into_iter()
            .map(|dept| (dept.department_id, dept.value))
            .collect();

    let days = readings::daily_values(&state.db, metric, &reading_filter, &period)
        .await
        .map_err(map_db_error)?;
    let anomalies = scan_daily_anomalies(days, ANOMALY_Z_THRESHOLD)
        .iter()
        .map(anomaly_report)
        .collect();

    Ok(InsightsResponse {
        metric,
        time_series,
        hotspots: Hotspots {
            departments: rank_hotspots(departments, &previous, HOTSPOT_LIMIT),
        },
        anomalies,
        filters,
    })
}

#[utoipa::path(
    get,
    path = "/api/kpi/{metric}/insights",
    tag = "kpi",
    params(
        ("metric" = String, Path, description = "energy, water, waste or emissions"),
        KpiQuery
    ),
    responses(
        (status = 200, description = "Time series, hotspots and anomalies", body = InsightsResponse),
        (status = 400, description = "Invalid metric or query"),
        (status = 401, description = "Unauthorized")
    ),
    security(("HTTPBearer" = []))
)]
pub(crate) async fn insights(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(metric): Path<String>,
    Query(query): Query<KpiQuery>,
) -> AppResult<Json<ApiResponse<InsightsResponse>>> {
    let filters = parse_filters(&query, DateRangeKind::Month, Some(BucketInterval::Day))?;
    let metric: MetricType = metric.parse().map_err(AppError::bad_request)?;
    let period = resolve_date_range(filters.date_range, Utc::now());
    Ok(Json(ApiResponse::ok(
        build_insights(&state, metric, filters, period).await?,
    )))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/kpi/summary", get(summary))
        .route("/kpi/summary/export", get(export_summary))
        .route("/kpi/{metric}/insights", get(insights))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrendDirection;

    #[test]
    fn defaults_apply_per_endpoint() {
        let query = KpiQuery::default();
        let summary = parse_filters(&query, DateRangeKind::Today, None).unwrap();
        assert_eq!(summary.date_range, DateRangeKind::Today);
        assert_eq!(summary.interval, None);

        let insights =
            parse_filters(&query, DateRangeKind::Month, Some(BucketInterval::Day)).unwrap();
        assert_eq!(insights.date_range, DateRangeKind::Month);
        assert_eq!(insights.interval, Some(BucketInterval::Day));
    }

    #[test]
    fn invalid_query_values_are_rejected() {
        let err = parse_filters(
            &KpiQuery {
                date_range: Some("decade".to_string()),
                ..KpiQuery::default()
            },
            DateRangeKind::Today,
            None,
        )
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Invalid date range");

        let err = parse_filters(
            &KpiQuery {
                unit_id: Some("plant-a".to_string()),
                ..KpiQuery::default()
            },
            DateRangeKind::Today,
            None,
        )
        .unwrap_err();
        assert_eq!(err.message, "Invalid unitId");

        let err = parse_filters(
            &KpiQuery {
                interval: Some("minute".to_string()),
                ..KpiQuery::default()
            },
            DateRangeKind::Month,
            Some(BucketInterval::Day),
        )
        .unwrap_err();
        assert_eq!(err.message, "Invalid interval");
    }

    #[test]
    fn filters_echo_parsed_ids() {
        let id = Uuid::new_v4();
        let filters = parse_filters(
            &KpiQuery {
                date_range: Some("week".to_string()),
                department_id: Some(id.to_string()),
                unit_id: Some("  ".to_string()),
                ..KpiQuery::default()
            },
            DateRangeKind::Today,
            None,
        )
        .unwrap();
        assert_eq!(filters.readings().department_id, Some(id));
        assert_eq!(filters.readings().unit_id, None);
        let value = serde_json::to_value(filters).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "dateRange": "week", "departmentId": id.to_string() })
        );
    }

    #[test]
    fn csv_export_has_header_metrics_and_overall() {
        let kpis: Vec<KpiSummary> = MetricType::ALL
            .iter()
            .map(|&metric| metric_kpi(metric, 10.0, 5.0, &[]))
            .collect();
        let summary = SummaryResponse {
            overall: overall_kpi(&kpis),
            kpis,
            filters: parse_filters(&KpiQuery::default(), DateRangeKind::Today, None).unwrap(),
        };
        assert_eq!(summary.overall.trend, TrendDirection::Up);

        let csv = String::from_utf8(summary_csv(&summary).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "metric,unit,current_value,previous_value,delta,delta_percentage,trend"
        );
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[1], "energy,kWh,10.0,5.0,5.0,100.0,up");
        assert_eq!(lines[5], "overall,total,40.0,20.0,20.0,100.0,up");
    }
}

use std::collections::HashMap;
use uuid::Uuid;

use super::anomaly::DailyAnomaly;
use super::trend::{
    calculate_delta, calculate_delta_percentage, determine_trend, generate_sparkline,
};
use crate::models::{MetricType, TrendDirection};

pub const SPARKLINE_POINTS: usize = 7;
pub const HOTSPOT_LIMIT: usize = 10;

const OVERALL_METRIC: &str = "overall";
const OVERALL_UNIT: &str = "total";
const UNKNOWN_DEPARTMENT: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KpiSummary {
    pub metric: String,
    pub current_value: f64,
    pub previous_value: f64,
    pub delta: f64,
    pub delta_percentage: f64,
    pub trend: TrendDirection,
    pub sparkline: Vec<f64>,
    pub unit: String,
}

/// `series` is the current period's readings in timestamp order, or an
/// already-strided subset of them; re-striding a subset is a no-op.
pub fn metric_kpi(metric: MetricType, current: f64, previous: f64, series: &[f64]) -> KpiSummary {
    let delta = calculate_delta(current, previous);
    KpiSummary {
        metric: metric.as_str().to_string(),
        current_value: current,
        previous_value: previous,
        delta,
        delta_percentage: calculate_delta_percentage(current, previous),
        trend: determine_trend(delta),
        sparkline: generate_sparkline(series, SPARKLINE_POINTS),
        unit: metric.unit().to_string(),
    }
}

/// Cross-metric roll-up; the sparkline holds each metric's current value.
pub fn overall_kpi(kpis: &[KpiSummary]) -> KpiSummary {
    let current: f64 = kpis.iter().map(|kpi| kpi.current_value).sum();
    let previous: f64 = kpis.iter().map(|kpi| kpi.previous_value).sum();
    let delta = calculate_delta(current, previous);
    KpiSummary {
        metric: OVERALL_METRIC.to_string(),
        current_value: current,
        previous_value: previous,
        delta,
        delta_percentage: calculate_delta_percentage(current, previous),
        trend: determine_trend(delta),
        sparkline: kpis.iter().map(|kpi| kpi.current_value).collect(),
        unit: OVERALL_UNIT.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepartmentTotal {
    pub department_id: Uuid,
    pub name: Option<String>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, utoipa::ToSchema)]
pub struct HotspotData {
    pub category: String,
    pub value: f64,
    pub percentage: f64,
    pub trend: TrendDirection,
}

/// Top departments by value with their share of all departments' total and the
/// trend against `previous` (department id to previous-period value).
pub fn rank_hotspots(
    mut current: Vec<DepartmentTotal>,
    previous: &HashMap<Uuid, f64>,
    limit: usize,
) -> Vec<HotspotData> {
    let total: f64 = current.iter().map(|dept| dept.value).sum();
    current.sort_by(|a, b| {
        b.value
            .total_cmp(&a.value)
            .then_with(|| a.name.cmp(&b.name))
    });
    current
        .into_iter()
        .take(limit)
        .map(|dept| {
            let before = previous.get(&dept.department_id).copied().unwrap_or(0.0);
            HotspotData {
                category: dept
                    .name
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| UNKNOWN_DEPARTMENT.to_string()),
                percentage: if total > 0.0 {
                    dept.value / total * 100.0
                } else {
                    0.0
                },
                trend: determine_trend(calculate_delta(dept.value, before)),
                value: dept.value,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyData {
    pub timestamp: String,
    pub value: f64,
    pub expected_value: f64,
    pub deviation: f64,
    pub severity: usize,
}

pub fn anomaly_report(day: &DailyAnomaly) -> AnomalyData {
    AnomalyData {
        timestamp: day.day.to_rfc3339(),
        value: day.most_deviant(),
        expected_value: day.mean,
        deviation: day.std_dev,
        severity: day.anomalies.len(),
    }
}

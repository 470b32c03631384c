//! KPI math shared by the summary and insights endpoints.
//!
//! Everything here is pure: the routes fetch grouped rows from the reading store and
//! hand plain numbers to these functions.

mod anomaly;
mod buckets;
mod summary;
mod trend;

pub use anomaly::{detect_anomaly, scan_daily_anomalies, DailyAnomaly, ANOMALY_Z_THRESHOLD};
pub use buckets::{aggregate_by_time, bucket_series, bucket_start, BucketInterval, Sample, TimeBucket};
pub use summary::{
    anomaly_report, metric_kpi, overall_kpi, rank_hotspots, AnomalyData, DepartmentTotal,
    HotspotData, KpiSummary, HOTSPOT_LIMIT, SPARKLINE_POINTS,
};
pub use trend::{
    assess_data_quality, calculate_cost_impact, calculate_delta, calculate_delta_percentage,
    determine_trend, determine_trend_with_threshold, generate_sparkline, TREND_THRESHOLD,
};

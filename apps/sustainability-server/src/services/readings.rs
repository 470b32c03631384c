use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{MetricType, QualityFlag};
use crate::services::kpi::{DepartmentTotal, Sample};
use crate::time::Period;

const INSERT_BATCH_SIZE: usize = 1000;

/// Optional reference-entity filters shared by the KPI endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadingFilter {
    pub unit_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub machine_id: Option<Uuid>,
    pub shift_id: Option<Uuid>,
}

impl ReadingFilter {
    fn push_conditions(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        let columns = [
            ("r.unit_id", self.unit_id),
            ("r.department_id", self.department_id),
            ("r.machine_id", self.machine_id),
            ("r.shift_id", self.shift_id),
        ];
        for (column, value) in columns {
            if let Some(id) = value {
                qb.push(" AND ").push(column).push(" = ").push_bind(id);
            }
        }
    }
}

/// Pushes `SELECT {select} FROM meter_readings r ... WHERE` scoped to the period,
/// the optional metric and the filter.
fn push_scope(
    qb: &mut QueryBuilder<'static, Postgres>,
    select: &str,
    join: &str,
    metric: Option<MetricType>,
    filter: &ReadingFilter,
    period: &Period,
) {
    qb.push("SELECT ").push(select).push(" FROM meter_readings r");
    if !join.is_empty() {
        qb.push(" ").push(join);
    }
    qb.push(" WHERE r.ts BETWEEN ")
        .push_bind(period.start)
        .push(" AND ")
        .push_bind(period.end);
    if let Some(metric) = metric {
        qb.push(" AND r.metric = ").push_bind(metric.as_str());
    }
    filter.push_conditions(qb);
}

/// Callers append grouping and ordering.
fn scoped_query(
    select: &str,
    join: &str,
    metric: Option<MetricType>,
    filter: &ReadingFilter,
    period: &Period,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("");
    push_scope(&mut qb, select, join, metric, filter, period);
    qb
}

/// Per metric, every `total / points`-th reading in timestamp order (all of them
/// when there are at most `points`), so only the sparkline picks leave the database.
fn sparkline_query(
    filter: &ReadingFilter,
    period: &Period,
    points: usize,
) -> QueryBuilder<'static, Postgres> {
    let points = i64::try_from(points).unwrap_or(i64::MAX);
    let mut qb = QueryBuilder::new("SELECT metric, value FROM (");
    push_scope(
        &mut qb,
        "r.metric, r.value, \
         row_number() OVER (PARTITION BY r.metric ORDER BY r.ts, r.id) - 1 AS idx, \
         COUNT(*) OVER (PARTITION BY r.metric) AS total",
        "",
        None,
        filter,
        period,
    );
    qb.push(") s WHERE total <= ")
        .push_bind(points)
        .push(" OR (idx % GREATEST(total / ")
        .push_bind(points)
        .push(", 1) = 0 AND idx / GREATEST(total / ")
        .push_bind(points)
        .push(", 1) < ")
        .push_bind(points)
        .push(") ORDER BY metric, idx");
    qb
}

/// Summed value per metric; metrics without readings are absent.
pub async fn metric_sums(
    db: &PgPool,
    filter: &ReadingFilter,
    period: &Period,
) -> Result<HashMap<MetricType, f64>, sqlx::Error> {
    let mut qb = scoped_query("r.metric, SUM(r.value)", "", None, filter, period);
    qb.push(" GROUP BY r.metric");
    let rows: Vec<(String, f64)> = qb.build_query_as().fetch_all(db).await?;
    Ok(rows
        .into_iter()
        .filter_map(|(metric, total)| metric.parse().ok().map(|metric| (metric, total)))
        .collect())
}

/// Sparkline samples per metric in timestamp order; metrics without readings are
/// absent.
pub async fn sparkline_values(
    db: &PgPool,
    filter: &ReadingFilter,
    period: &Period,
    points: usize,
) -> Result<HashMap<MetricType, Vec<f64>>, sqlx::Error> {
    let mut values: HashMap<MetricType, Vec<f64>> = HashMap::new();
    if points == 0 {
        return Ok(values);
    }
    let rows: Vec<(String, f64)> = sparkline_query(filter, period, points)
        .build_query_as()
        .fetch_all(db)
        .await?;
    for (metric, value) in rows {
        if let Ok(metric) = metric.parse::<MetricType>() {
            values.entry(metric).or_default().push(value);
        }
    }
    Ok(values)
}

/// Hourly UTC sums, the finest bucket the insights endpoint rolls up from.
pub async fn hourly_samples(
    db: &PgPool,
    metric: MetricType,
    filter: &ReadingFilter,
    period: &Period,
) -> Result<Vec<Sample>, sqlx::Error> {
    let mut qb = scoped_query(
        "date_trunc('hour', r.ts, 'UTC') AS bucket, SUM(r.value), COUNT(*)",
        "",
        Some(metric),
        filter,
        period,
    );
    qb.push(" GROUP BY bucket ORDER BY bucket ASC");
    let rows: Vec<(DateTime<Utc>, f64, i64)> = qb.build_query_as().fetch_all(db).await?;
    Ok(rows
        .into_iter()
        .map(|(timestamp, value, count)| Sample {
            timestamp,
            value,
            count: u64::try_from(count).unwrap_or(0),
        })
        .collect())
}

pub async fn department_totals(
    db: &PgPool,
    metric: MetricType,
    filter: &ReadingFilter,
    period: &Period,
) -> Result<Vec<DepartmentTotal>, sqlx::Error> {
    let mut qb = scoped_query(
        "r.department_id, d.name, SUM(r.value)",
        "LEFT JOIN departments d ON d.id = r.department_id",
        Some(metric),
        filter,
        period,
    );
    qb.push(" GROUP BY r.department_id, d.name");
    let rows: Vec<(Uuid, Option<String>, f64)> = qb.build_query_as().fetch_all(db).await?;
    Ok(rows
        .into_iter()
        .map(|(department_id, name, value)| DepartmentTotal {
            department_id,
            name,
            value,
        })
        .collect())
}

/// Reading values grouped by UTC day, each day in timestamp order.
pub async fn daily_values(
    db: &PgPool,
    metric: MetricType,
    filter: &ReadingFilter,
    period: &Period,
) -> Result<Vec<(DateTime<Utc>, Vec<f64>)>, sqlx::Error> {
    let mut qb = scoped_query(
        "date_trunc('day', r.ts, 'UTC') AS day, array_agg(r.value ORDER BY r.ts)",
        "",
        Some(metric),
        filter,
        period,
    );
    qb.push(" GROUP BY day ORDER BY day DESC");
    qb.build_query_as().fetch_all(db).await
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub metric: MetricType,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub unit_id: Uuid,
    pub department_id: Uuid,
    pub machine_id: Option<Uuid>,
    pub shift_id: Uuid,
    pub quality_flag: QualityFlag,
}

/// Bulk insert in fixed-size batches; returns the number of rows written.
pub async fn insert_readings(db: &PgPool, readings: &[NewReading]) -> Result<u64, sqlx::Error> {
    let mut written = 0;
    for batch in readings.chunks(INSERT_BATCH_SIZE) {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO meter_readings \
             (id, metric, ts, value, unit, unit_id, department_id, machine_id, shift_id, quality_flag) ",
        );
        qb.push_values(batch, |mut row, reading| {
            row.push_bind(Uuid::new_v4())
                .push_bind(reading.metric.as_str())
                .push_bind(reading.timestamp)
                .push_bind(reading.value)
                .push_bind(reading.metric.unit())
                .push_bind(reading.unit_id)
                .push_bind(reading.department_id)
                .push_bind(reading.machine_id)
                .push_bind(reading.shift_id)
                .push_bind(reading.quality_flag.as_str());
        });
        written += qb.build().execute(db).await?.rows_affected();
    }
    Ok(written)
}

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BucketInterval {
    Hour,
    Day,
    Week,
    Month,
}

impl BucketInterval {
    pub fn as_str(self) -> &'static str {
        match self {
            BucketInterval::Hour => "hour",
            BucketInterval::Day => "day",
            BucketInterval::Week => "week",
            BucketInterval::Month => "month",
        }
    }
}

impl FromStr for BucketInterval {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "hour" => Ok(BucketInterval::Hour),
            "day" => Ok(BucketInterval::Day),
            "week" => Ok(BucketInterval::Week),
            "month" => Ok(BucketInterval::Month),
            _ => Err("Invalid interval".to_string()),
        }
    }
}

/// A pre-aggregated observation: `value` is the sum of `count` readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeBucket {
    pub start: DateTime<Utc>,
    pub sum: f64,
    pub count: u64,
}

impl TimeBucket {
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Start of the UTC bucket containing `ts`. Weeks start on Sunday.
pub fn bucket_start(ts: DateTime<Utc>, interval: BucketInterval) -> DateTime<Utc> {
    let date = ts.date_naive();
    match interval {
        BucketInterval::Hour => midnight(date) + Duration::hours(i64::from(ts.hour())),
        BucketInterval::Day => midnight(date),
        BucketInterval::Week => {
            let back = i64::from(date.weekday().num_days_from_sunday());
            midnight(date - Duration::days(back))
        }
        BucketInterval::Month => {
            let first = NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date);
            midnight(first)
        }
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Groups samples into interval buckets, ascending by bucket start.
pub fn bucket_series<I>(samples: I, interval: BucketInterval) -> Vec<TimeBucket>
where
    I: IntoIterator<Item = Sample>,
{
    let mut grouped: BTreeMap<DateTime<Utc>, (f64, u64)> = BTreeMap::new();
    for sample in samples {
        let entry = grouped
            .entry(bucket_start(sample.timestamp, interval))
            .or_insert((0.0, 0));
        entry.0 += sample.value;
        entry.1 += sample.count;
    }
    grouped
        .into_iter()
        .map(|(start, (sum, count))| TimeBucket { start, sum, count })
        .collect()
}

/// Mean reading per bucket for raw `(timestamp, value)` points.
pub fn aggregate_by_time(
    points: &[(DateTime<Utc>, f64)],
    interval: BucketInterval,
) -> Vec<(DateTime<Utc>, f64)> {
    let samples = points.iter().map(|(timestamp, value)| Sample {
        timestamp: *timestamp,
        value: *value,
        count: 1,
    });
    bucket_series(samples, interval)
        .into_iter()
        .map(|bucket| (bucket.start, bucket.mean()))
        .collect()
}

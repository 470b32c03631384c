use chrono::{DateTime, Utc};
use statrs::statistics::Statistics;

/// Readings further than this many population standard deviations from the mean
/// are anomalous.
pub const ANOMALY_Z_THRESHOLD: f64 = 2.0;

const MIN_SAMPLES: usize = 3;

/// z-score check of `current` against the population statistics of `values`.
pub fn detect_anomaly(values: &[f64], current: f64, threshold: f64) -> bool {
    if values.len() < MIN_SAMPLES {
        return false;
    }
    let mean = values.iter().mean();
    let std_dev = values.iter().population_std_dev();
    let z_score = ((current - mean) / std_dev).abs();
    // NaN (zero spread, no deviation) compares false.
    z_score > threshold
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyAnomaly {
    pub day: DateTime<Utc>,
    pub mean: f64,
    pub std_dev: f64,
    pub anomalies: Vec<f64>,
}

impl DailyAnomaly {
    /// The anomalous reading furthest from the daily mean.
    pub fn most_deviant(&self) -> f64 {
        self.anomalies
            .iter()
            .copied()
            .max_by(|a, b| (a - self.mean).abs().total_cmp(&(b - self.mean).abs()))
            .unwrap_or(self.mean)
    }
}

/// Flags readings outside `threshold` standard deviations of their own day's mean.
/// Days with fewer than three readings or no outliers are dropped; the rest are
/// returned newest first.
pub fn scan_daily_anomalies<I>(days: I, threshold: f64) -> Vec<DailyAnomaly>
where
    I: IntoIterator<Item = (DateTime<Utc>, Vec<f64>)>,
{
    let mut flagged: Vec<DailyAnomaly> = days
        .into_iter()
        .filter(|(_, values)| values.len() >= MIN_SAMPLES)
        .filter_map(|(day, values)| {
            let mean = values.iter().mean();
            let std_dev = values.iter().population_std_dev();
            let anomalies: Vec<f64> = values
                .iter()
                .copied()
                .filter(|value| (value - mean).abs() > threshold * std_dev)
                .collect();
            if anomalies.is_empty() {
                return None;
            }
            Some(DailyAnomaly {
                day,
                mean,
                std_dev,
                anomalies,
            })
        })
        .collect();
    flagged.sort_by(|a, b| b.day.cmp(&a.day));
    flagged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn fewer_than_three_samples_never_flag() {
        assert!(!detect_anomaly(&[], 1_000.0, 2.0));
        assert!(!detect_anomaly(&[1.0], 1_000.0, 2.0));
        assert!(!detect_anomaly(&[1.0, 2.0], 1_000.0, 2.0));
    }

    #[test]
    fn outlier_is_flagged() {
        let values = [10.0, 11.0, 9.0, 10.0, 10.5, 9.5];
        assert!(detect_anomaly(&values, 20.0, 2.0));
        assert!(!detect_anomaly(&values, 10.2, 2.0));
    }

    #[test]
    fn flat_series_only_flags_different_values() {
        let values = [5.0, 5.0, 5.0];
        assert!(!detect_anomaly(&values, 5.0, 2.0));
        assert!(detect_anomaly(&values, 5.1, 2.0));
    }

    #[test]
    fn daily_scan_reports_outlier_days_newest_first() {
        let mut spiky = vec![10.0; 23];
        spiky.push(100.0);
        let days = vec![
            (day("2024-05-01T00:00:00Z"), spiky.clone()),
            (day("2024-05-02T00:00:00Z"), vec![10.0, 10.0, 10.0, 10.0]),
            (day("2024-05-03T00:00:00Z"), spiky),
            (day("2024-05-04T00:00:00Z"), vec![1.0, 500.0]),
        ];
        let flagged = scan_daily_anomalies(days, ANOMALY_Z_THRESHOLD);
        assert_eq!(flagged.len(), 2);
        assert_eq!(flagged[0].day, day("2024-05-03T00:00:00Z"));
        assert_eq!(flagged[1].day, day("2024-05-01T00:00:00Z"));
        assert_eq!(flagged[0].anomalies, vec![100.0]);
        assert_eq!(flagged[0].most_deviant(), 100.0);
        assert!(flagged[0].std_dev > 0.0);
    }
}

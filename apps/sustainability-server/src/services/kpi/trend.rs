use crate::models::{QualityFlag, TrendDirection};

/// Deltas smaller than this (in metric units) count as no change.
pub const TREND_THRESHOLD: f64 = 0.05;

pub fn calculate_delta(current: f64, previous: f64) -> f64 {
    current - previous
}

/// Percentage change from `previous`; a zero baseline reports 100% growth when
/// anything was recorded and 0% otherwise.
pub fn calculate_delta_percentage(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return if current > 0.0 { 100.0 } else { 0.0 };
    }
    (current - previous) / previous * 100.0
}

pub fn determine_trend(delta: f64) -> TrendDirection {
    determine_trend_with_threshold(delta, TREND_THRESHOLD)
}

pub fn determine_trend_with_threshold(delta: f64, threshold: f64) -> TrendDirection {
    if delta.abs() < threshold {
        TrendDirection::Stable
    } else if delta > 0.0 {
        TrendDirection::Up
    } else {
        TrendDirection::Down
    }
}

/// Picks every `len / points`-th sample. This is a stride pick, not an average, so
/// short spikes between picks are lost.
pub fn generate_sparkline(data: &[f64], points: usize) -> Vec<f64> {
    if points == 0 {
        return Vec::new();
    }
    if data.len() <= points {
        return data.to_vec();
    }
    let step = data.len() / points;
    (0..points)
        .map(|i| data.get(i * step).copied().unwrap_or(0.0))
        .collect()
}

pub fn assess_data_quality(value: f64, expected_range: (f64, f64)) -> QualityFlag {
    let (min, max) = expected_range;
    if value >= min && value <= max {
        QualityFlag::Good
    } else if value >= min * 0.8 && value <= max * 1.2 {
        QualityFlag::Suspicious
    } else {
        QualityFlag::Bad
    }
}

pub fn calculate_cost_impact(value: f64, baseline: f64, cost_per_unit: f64) -> f64 {
    (value - baseline) * cost_per_unit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_percentage_zero_baseline() {
        assert_eq!(calculate_delta_percentage(0.0, 0.0), 0.0);
        assert_eq!(calculate_delta_percentage(5.0, 0.0), 100.0);
    }

    #[test]
    fn delta_percentage_regular() {
        assert_eq!(calculate_delta_percentage(150.0, 100.0), 50.0);
        assert_eq!(calculate_delta_percentage(50.0, 100.0), -50.0);
        assert_eq!(calculate_delta(50.0, 100.0), -50.0);
    }

    #[test]
    fn small_deltas_are_stable_either_sign() {
        for delta in [0.0, 0.049, -0.049, 0.01, -0.0001] {
            assert_eq!(determine_trend(delta), TrendDirection::Stable, "delta {delta}");
        }
        assert_eq!(determine_trend(0.05), TrendDirection::Up);
        assert_eq!(determine_trend(-0.05), TrendDirection::Down);
        assert_eq!(determine_trend(-120.0), TrendDirection::Down);
    }

    #[test]
    fn sparkline_keeps_short_series() {
        assert_eq!(generate_sparkline(&[1.0, 2.0, 3.0], 7), vec![1.0, 2.0, 3.0]);
        assert!(generate_sparkline(&[], 7).is_empty());
    }

    #[test]
    fn sparkline_strides_long_series() {
        let data: Vec<f64> = (0..20).map(f64::from).collect();
        // step = 20 / 7 = 2
        assert_eq!(
            generate_sparkline(&data, 7),
            vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0, 12.0]
        );
    }

    #[test]
    fn sparkline_length_is_bounded() {
        for len in 0..50usize {
            let data: Vec<f64> = (0..len).map(|v| v as f64).collect();
            for points in 0..10usize {
                let out = generate_sparkline(&data, points);
                assert!(out.len() <= len, "len {len} points {points}");
                assert!(out.len() <= points, "len {len} points {points}");
            }
        }
    }

    #[test]
    fn quality_bands() {
        assert_eq!(assess_data_quality(150.0, (100.0, 200.0)), QualityFlag::Good);
        assert_eq!(assess_data_quality(85.0, (100.0, 200.0)), QualityFlag::Suspicious);
        assert_eq!(assess_data_quality(230.0, (100.0, 200.0)), QualityFlag::Suspicious);
        assert_eq!(assess_data_quality(10.0, (100.0, 200.0)), QualityFlag::Bad);
        assert_eq!(assess_data_quality(500.0, (100.0, 200.0)), QualityFlag::Bad);
    }

    #[test]
    fn cost_impact_is_signed() {
        assert_eq!(calculate_cost_impact(120.0, 100.0, 0.5), 10.0);
        assert_eq!(calculate_cost_impact(80.0, 100.0, 0.5), -10.0);
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Energy,
    Water,
    Waste,
    Emissions,
}

impl MetricType {
    pub const ALL: [MetricType; 4] = [
        MetricType::Energy,
        MetricType::Water,
        MetricType::Waste,
        MetricType::Emissions,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricType::Energy => "energy",
            MetricType::Water => "water",
            MetricType::Waste => "waste",
            MetricType::Emissions => "emissions",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            MetricType::Energy => "kWh",
            MetricType::Water => "m³",
            MetricType::Waste => "kg",
            MetricType::Emissions => "tCO₂e",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        MetricType::ALL
            .into_iter()
            .find(|metric| metric.as_str() == value.trim())
            .ok_or_else(|| "Invalid metric type".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QualityFlag {
    Good,
    Suspicious,
    Bad,
}

impl QualityFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            QualityFlag::Good => "good",
            QualityFlag::Suspicious => "suspicious",
            QualityFlag::Bad => "bad",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

impl TrendDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            TrendDirection::Up => "up",
            TrendDirection::Down => "down",
            TrendDirection::Stable => "stable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_parses_known_names_only() {
        assert_eq!("water".parse::<MetricType>(), Ok(MetricType::Water));
        assert_eq!(" emissions ".parse::<MetricType>(), Ok(MetricType::Emissions));
        assert_eq!(
            "carbon".parse::<MetricType>(),
            Err("Invalid metric type".to_string())
        );
    }

    #[test]
    fn metric_units_match_dashboard_labels() {
        let units: Vec<&str> = MetricType::ALL.iter().map(|m| m.unit()).collect();
        assert_eq!(units, vec!["kWh", "m³", "kg", "tCO₂e"]);
    }

    #[test]
    fn enums_serialize_lowercase() {
        assert_eq!(
            serde_json::to_value(MetricType::Energy).unwrap(),
            serde_json::json!("energy")
        );
        assert_eq!(
            serde_json::to_value(TrendDirection::Stable).unwrap(),
            serde_json::json!("stable")
        );
        assert_eq!(
            serde_json::to_value(QualityFlag::Suspicious).unwrap(),
            serde_json::json!("suspicious")
        );
    }
}

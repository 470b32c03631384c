use chrono::{DateTime, Duration, Months, NaiveTime, TimeZone, Utc};
use std::str::FromStr;

pub const INVALID_DATE_RANGE: &str = "Invalid date range";

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DateRangeKind {
    Today,
    Week,
    Month,
    Quarter,
    Year,
}

impl DateRangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DateRangeKind::Today => "today",
            DateRangeKind::Week => "week",
            DateRangeKind::Month => "month",
            DateRangeKind::Quarter => "quarter",
            DateRangeKind::Year => "year",
        }
    }
}

impl FromStr for DateRangeKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "today" => Ok(DateRangeKind::Today),
            "week" => Ok(DateRangeKind::Week),
            "month" => Ok(DateRangeKind::Month),
            "quarter" => Ok(DateRangeKind::Quarter),
            "year" => Ok(DateRangeKind::Year),
            _ => Err(INVALID_DATE_RANGE.to_string()),
        }
    }
}

/// Closed UTC window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Period {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// The equal-length window ending where this one starts.
    pub fn previous(&self) -> Period {
        let length = self.duration();
        Period {
            start: self.start - length,
            end: self.end - length,
        }
    }
}

pub fn resolve_date_range(kind: DateRangeKind, now: DateTime<Utc>) -> Period {
    let start = match kind {
        DateRangeKind::Today => Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN)),
        DateRangeKind::Week => now - Duration::days(7),
        DateRangeKind::Month => months_before(now, 1),
        DateRangeKind::Quarter => months_before(now, 3),
        DateRangeKind::Year => months_before(now, 12),
    };
    Period { start, end: now }
}

// Clamps to the last valid day (Mar 31 minus one month is Feb 28/29).
fn months_before(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn today_starts_at_utc_midnight() {
        let now = ts("2024-05-15T13:30:00Z");
        let period = resolve_date_range(DateRangeKind::Today, now);
        assert_eq!(period.start, ts("2024-05-15T00:00:00Z"));
        assert_eq!(period.end, now);
    }

    #[test]
    fn calendar_ranges_subtract_months() {
        let now = ts("2024-05-31T08:00:00Z");
        assert_eq!(
            resolve_date_range(DateRangeKind::Week, now).start,
            ts("2024-05-24T08:00:00Z")
        );
        assert_eq!(
            resolve_date_range(DateRangeKind::Month, now).start,
            ts("2024-04-30T08:00:00Z")
        );
        assert_eq!(
            resolve_date_range(DateRangeKind::Quarter, now).start,
            ts("2024-02-29T08:00:00Z")
        );
        assert_eq!(
            resolve_date_range(DateRangeKind::Year, now).start,
            ts("2023-05-31T08:00:00Z")
        );
    }

    #[test]
    fn previous_period_is_adjacent_and_equal_length() {
        let now = ts("2024-05-15T12:00:00Z");
        let current = resolve_date_range(DateRangeKind::Week, now);
        let previous = current.previous();
        assert_eq!(previous.end, current.start);
        assert_eq!(previous.duration(), current.duration());
        assert_eq!(previous.start, ts("2024-05-01T12:00:00Z"));
    }

    #[test]
    fn unknown_keyword_is_rejected() {
        assert_eq!("quarter".parse::<DateRangeKind>(), Ok(DateRangeKind::Quarter));
        assert_eq!(
            "fortnight".parse::<DateRangeKind>(),
            Err(INVALID_DATE_RANGE.to_string())
        );
    }
}

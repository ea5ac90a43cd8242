//! Acquisition-time handling.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Parse an ISO 8601 timestamp, assuming UTC when no offset is given.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

/// Time span covered by a set of acquisitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    /// Smallest window spanning all timestamps. `None` when empty.
    pub fn spanning<I>(times: I) -> Option<Self>
    where
        I: IntoIterator<Item = DateTime<Utc>>,
    {
        let mut iter = times.into_iter();
        let first = iter.next()?;
        let (start, end) = iter.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
        Some(Self { start, end })
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.end
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variants() {
        let a = parse_timestamp("2024-07-01T10:30:00Z").unwrap();
        let b = parse_timestamp("2024-07-01T10:30:00").unwrap();
        let c = parse_timestamp("2024-07-01T12:30:00+02:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);

        let d = parse_timestamp("2024-07-01").unwrap();
        assert_eq!(d.to_rfc3339(), "2024-07-01T00:00:00+00:00");

        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_spanning_window() {
        let t1 = parse_timestamp("2024-07-03T00:00:00Z").unwrap();
        let t2 = parse_timestamp("2024-07-01T00:00:00Z").unwrap();
        let t3 = parse_timestamp("2024-07-02T00:00:00Z").unwrap();

        let window = TimeWindow::spanning([t1, t2, t3]).unwrap();
        assert_eq!(window.start, t2);
        assert_eq!(window.end, t1);
        assert_eq!(window.duration().num_days(), 2);
        assert!(window.contains(t3));
        assert!(TimeWindow::spanning(std::iter::empty()).is_none());
    }
}

//! Validated aggregation time window

use chrono::{DateTime, Utc};
use trellis_domain::{Result, TrellisError};

/// A half-open `[start, end)` time range for an aggregation call.
///
/// Construction is the validation step: a window that exists is a window
/// the aggregator may fan out over, so no provider I/O ever starts with a
/// degenerate range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl AggregationWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(TrellisError::Validation(format!(
                "window start {start} must be before end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn rejects_inverted_range() {
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        let err = AggregationWindow::new(start, end).unwrap_err();
        assert!(matches!(err, TrellisError::Validation(_)));
    }

    #[test]
    fn rejects_empty_range() {
        let at = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        assert!(AggregationWindow::new(at, at).is_err());
    }

    #[test]
    fn accepts_ordered_range() {
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let window = AggregationWindow::new(start, end).unwrap();
        assert_eq!(window.start(), start);
        assert_eq!(window.end(), end);
    }
}

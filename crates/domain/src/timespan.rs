use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Inclusive query window over event time. Events overlap the span when
/// `event.start <= span.end && event.end >= span.start`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpan {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeSpan {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn exposes_bounds_and_duration() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let span = TimeSpan::new(start, end);
        assert_eq!(span.start(), start);
        assert_eq!(span.end(), end);
        assert_eq!(span.duration(), Duration::days(1));
    }
}

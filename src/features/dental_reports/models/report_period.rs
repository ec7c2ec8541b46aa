use chrono::{DateTime, Utc};

/// Inclusive reporting window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// One bucket of the breakdown, `[start, end]` inclusive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPeriod {
    pub label: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportPeriod {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

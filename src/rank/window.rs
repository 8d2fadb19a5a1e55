//! # Trailing Window
//! Fixed 24h range ending at the moment a snapshot is built.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

pub const WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrailingWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TrailingWindow {
    pub fn ending_at(end: DateTime<Utc>) -> Self {
        Self {
            start: end - Duration::hours(WINDOW_HOURS),
            end,
        }
    }

    /// Strictly after `start`. No upper bound: clock skew upstream can put
    /// `time` slightly in the future and such items still count.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t > self.start
    }
}

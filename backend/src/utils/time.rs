//! Clock seam for `created_at` / `acknowledged_at` stamping.
//!
//! Production code holds a `Clock::System` in the application state;
//! tests freeze time with `Clock::fixed` so timestamps are
//! deterministic.

use chrono::{DateTime, TimeZone, Utc};

#[derive(Debug, Clone)]
pub enum Clock {
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// A clock pinned to one instant.
    pub fn fixed(instant: DateTime<Utc>) -> Self {
        Clock::Fixed(instant)
    }

    /// A clock pinned to a unix timestamp, for test fixtures.
    pub fn fixed_at(secs: i64) -> Self {
        Clock::Fixed(Utc.timestamp_opt(secs, 0).single().expect("valid timestamp"))
    }

    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(instant) => *instant,
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Clock::System
    }
}

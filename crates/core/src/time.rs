use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, Utc};
use thiserror::Error;

/// Calendar date used for "same day" comparisons.
pub type DateKey = NaiveDate;

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// Returns today's calendar day under the given boundary policy.
    #[must_use]
    pub fn today(&self, boundary: DayBoundary) -> DateKey {
        calendar_day(self.now(), boundary)
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }
}

//
// ─── DAY BOUNDARY ──────────────────────────────────────────────────────────────
//

/// Which timezone decides where one calendar day ends and the next begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayBoundary {
    Utc,
    /// The host's local timezone.
    #[default]
    Local,
    Fixed(FixedOffset),
}

/// Truncates a timestamp to its calendar date under `boundary`.
///
/// Two timestamps on the same `DateKey` are "the same day" no matter how many
/// hours separate them; 23:59 and 00:00 the following day are different days.
#[must_use]
pub fn calendar_day(at: DateTime<Utc>, boundary: DayBoundary) -> DateKey {
    match boundary {
        DayBoundary::Utc => at.date_naive(),
        DayBoundary::Local => at.with_timezone(&Local).date_naive(),
        DayBoundary::Fixed(offset) => at.with_timezone(&offset).date_naive(),
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid day boundary `{raw}` (expected `utc`, `local`, or `+HH:MM`)")]
pub struct ParseDayBoundaryError {
    raw: String,
}

impl FromStr for DayBoundary {
    type Err = ParseDayBoundaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseDayBoundaryError { raw: s.to_owned() };
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "utc" | "z" => return Ok(Self::Utc),
            "local" => return Ok(Self::Local),
            _ => {}
        }

        let (sign, rest) = match trimmed.as_bytes().first() {
            Some(b'+') => (1, &trimmed[1..]),
            Some(b'-') => (-1, &trimmed[1..]),
            _ => return Err(err()),
        };
        let (hours, minutes) = rest.split_once(':').ok_or_else(err)?;
        let hours: i32 = hours.parse().map_err(|_| err())?;
        let minutes: i32 = minutes.parse().map_err(|_| err())?;
        if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
            return Err(err());
        }
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(Self::Fixed)
            .ok_or_else(err)
    }
}

impl fmt::Display for DayBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayBoundary::Utc => f.write_str("utc"),
            DayBoundary::Local => f.write_str("local"),
            DayBoundary::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

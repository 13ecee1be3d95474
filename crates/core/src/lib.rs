#![forbid(unsafe_code)]

pub mod model;
pub mod sequencer;
pub mod time;

pub use time::{Clock, DateKey, DayBoundary, calendar_day};

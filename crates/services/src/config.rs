use std::time::Duration;

use lesson_core::DayBoundary;

use crate::error::ConfigError;

/// Timing and calendar knobs of the progression engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Display/accumulation tick. One accepted tick credits one watched second.
    pub ui_tick: Duration,
    /// Persistence tick.
    pub flush_interval: Duration,
    /// Accepted spacing between two UI ticks; ticks outside are dropped.
    pub tick_window: TickWindow,
    /// No resume seek when the saved position is this close to the end.
    pub resume_tail: Duration,
    pub day_boundary: DayBoundary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickWindow {
    pub min: Duration,
    pub max: Duration,
}

impl TickWindow {
    #[must_use]
    pub fn contains(&self, elapsed: Duration) -> bool {
        elapsed >= self.min && elapsed <= self.max
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ui_tick: Duration::from_secs(1),
            flush_interval: Duration::from_secs(10),
            tick_window: TickWindow {
                min: Duration::from_millis(900),
                max: Duration::from_millis(1500),
            },
            resume_tail: Duration::from_secs(5),
            day_boundary: DayBoundary::Local,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `PROGRESSION_FLUSH_SECS`,
    /// `PROGRESSION_RESUME_TAIL_SECS` and `PROGRESSION_DAY_BOUNDARY`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(secs) = positive_secs(&lookup, "PROGRESSION_FLUSH_SECS")? {
            config.flush_interval = secs;
        }
        if let Some(secs) = positive_secs(&lookup, "PROGRESSION_RESUME_TAIL_SECS")? {
            config.resume_tail = secs;
        }
        if let Some(raw) = lookup("PROGRESSION_DAY_BOUNDARY") {
            config.day_boundary = raw.parse()?;
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_day_boundary(mut self, day_boundary: DayBoundary) -> Self {
        self.day_boundary = day_boundary;
        self
    }
}

fn positive_secs(
    lookup: &impl Fn(&'static str) -> Option<String>,
    key: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Some(Duration::from_secs(secs))),
        _ => Err(ConfigError::InvalidNumber { key, raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<_, _> = vars.iter().map(|(k, v)| (*k, (*v).to_owned())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_engine_cadence() {
        let config = EngineConfig::default();
        assert_eq!(config.ui_tick, Duration::from_secs(1));
        assert_eq!(config.flush_interval, Duration::from_secs(10));
        assert!(config.tick_window.contains(Duration::from_millis(1000)));
        assert!(!config.tick_window.contains(Duration::from_millis(1600)));
        assert!(!config.tick_window.contains(Duration::from_millis(500)));
    }

    #[test]
    fn reads_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("PROGRESSION_FLUSH_SECS", "30"),
            ("PROGRESSION_DAY_BOUNDARY", "utc"),
        ]))
        .unwrap();
        assert_eq!(config.flush_interval, Duration::from_secs(30));
        assert_eq!(config.day_boundary, DayBoundary::Utc);
        assert_eq!(config.resume_tail, Duration::from_secs(5));
    }

    #[test]
    fn rejects_zero_and_garbage() {
        let zero = EngineConfig::from_lookup(lookup(&[("PROGRESSION_FLUSH_SECS", "0")]));
        assert!(matches!(zero, Err(ConfigError::InvalidNumber { .. })));

        let bad_day = EngineConfig::from_lookup(lookup(&[("PROGRESSION_DAY_BOUNDARY", "mars")]));
        assert!(matches!(bad_day, Err(ConfigError::DayBoundary(_))));
    }
}

//! Schedule contract and the built-in schedule kinds.
//!
//! A [`Schedule`] computes the next firing instant strictly after a given
//! time, or `None` when it will never fire again. Implementations must be
//! pure: the run loop calls `next` freely and relies on repeated calls with
//! the same argument returning the same instant.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;

use crate::error::{Result, SchedulerError};

/// Computes firing instants for an entry.
pub trait Schedule: Send + Sync {
    /// The next firing instant strictly after `after`, or `None` for "never".
    fn next(&self, after: DateTime<Tz>) -> Option<DateTime<Tz>>;
}

/// Fires on fixed wall-clock buckets: `truncate(t, period) + period`.
///
/// Periods are clamped to a one-second minimum and truncated to whole
/// seconds; sub-second precision is out of scope.
#[derive(Debug, Clone, Copy)]
pub struct Every {
    period_secs: i64,
}

impl Every {
    pub fn new(period: Duration) -> Self {
        Self {
            period_secs: (period.as_secs() as i64).max(1),
        }
    }
}

impl Schedule for Every {
    fn next(&self, after: DateTime<Tz>) -> Option<DateTime<Tz>> {
        let ts = after.timestamp();
        let next = ts - ts.rem_euclid(self.period_secs) + self.period_secs;
        after.timezone().timestamp_opt(next, 0).single()
    }
}

/// A parsed cron expression.
pub struct CronSchedule {
    inner: cron::Schedule,
}

impl CronSchedule {
    pub fn new(inner: cron::Schedule) -> Self {
        Self { inner }
    }
}

impl Schedule for CronSchedule {
    fn next(&self, after: DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.inner.after(&after).next()
    }
}

/// Parses spec strings into schedules.
///
/// The default shape is the standard 5-field cron line
/// (`minute hour day-of-month month day-of-week`); [`SpecParser::with_seconds`]
/// switches to the 6-field variant with a leading seconds field. Both are
/// normalized to the 7-field form the `cron` crate expects (seconds
/// prepended, year appended). Fields support `*`, ranges, steps, lists,
/// names, and `?` in the day fields.
///
/// Descriptors: `@yearly`, `@annually`, `@monthly`, `@weekly`, `@daily`,
/// `@midnight`, `@hourly` pass through to the expression parser;
/// `@every <duration>` (e.g. `@every 1h30m`) yields an [`Every`] schedule.
#[derive(Debug, Clone, Copy)]
pub struct SpecParser {
    seconds: bool,
}

impl Default for SpecParser {
    fn default() -> Self {
        Self::standard()
    }
}

impl SpecParser {
    /// Standard 5-field parser.
    pub fn standard() -> Self {
        Self { seconds: false }
    }

    /// 6-field parser with a leading seconds field.
    pub fn with_seconds() -> Self {
        Self { seconds: true }
    }

    pub fn parse(&self, spec: &str) -> Result<Arc<dyn Schedule>> {
        let spec = spec.trim();

        if let Some(dur) = spec.strip_prefix("@every ") {
            let dur = dur.trim();
            let period = humantime::parse_duration(dur)
                .map_err(|e| SchedulerError::InvalidDuration(dur.to_string(), e))?;
            return Ok(Arc::new(Every::new(period)));
        }

        if spec.starts_with('@') {
            return Ok(Arc::new(CronSchedule::new(cron::Schedule::from_str(spec)?)));
        }

        let expected = if self.seconds { 6 } else { 5 };
        let got = spec.split_whitespace().count();
        if got != expected {
            return Err(SchedulerError::FieldCount {
                spec: spec.to_string(),
                expected,
                got,
            });
        }

        // The cron crate wants `sec min hour dom month dow year`.
        let normalized = if self.seconds {
            format!("{spec} *")
        } else {
            format!("0 {spec} *")
        };
        Ok(Arc::new(CronSchedule::new(cron::Schedule::from_str(
            &normalized,
        )?)))
    }
}

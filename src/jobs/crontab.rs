//! Five-field cron rules: `MIN HOUR DOM MON DOW`
//!
//! Each field accepts `*`, `*/n`, `n`, `a-b`, `a-b/n` and comma lists of
//! those. Day of week counts from Sunday = 0. All fields must match; times
//! are evaluated in UTC at minute resolution.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, DurationRound, Timelike, Utc};
use thiserror::Error;

/// Longest window searched by [`Crontab::next_after`]
const SEARCH_LIMIT_MINUTES: i64 = 366 * 24 * 60;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid cron rule '{rule}': {reason}")]
pub struct CronError {
    pub rule: String,
    pub reason: String,
}

impl CronError {
    fn new(rule: &str, reason: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Clone, Copy)]
struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
}

const FIELDS: [FieldSpec; 5] = [
    FieldSpec { name: "minute", min: 0, max: 59 },
    FieldSpec { name: "hour", min: 0, max: 23 },
    FieldSpec { name: "day of month", min: 1, max: 31 },
    FieldSpec { name: "month", min: 1, max: 12 },
    FieldSpec { name: "day of week", min: 0, max: 6 },
];

/// Parsed cron rule. Each field is a bit set of allowed values.
#[derive(Clone, PartialEq, Eq)]
pub struct Crontab {
    source: String,
    minutes: u64,
    hours: u64,
    days: u64,
    months: u64,
    weekdays: u64,
}

impl Crontab {
    pub fn parse(rule: &str) -> Result<Self, CronError> {
        let parts: Vec<&str> = rule.split_whitespace().collect();
        if parts.len() != FIELDS.len() {
            return Err(CronError::new(
                rule,
                format!("expected 5 fields (MIN HOUR DOM MON DOW), got {}", parts.len()),
            ));
        }

        let mut masks = [0u64; 5];
        for (i, (part, spec)) in parts.iter().zip(FIELDS.iter()).enumerate() {
            masks[i] = parse_field(part, *spec).map_err(|reason| CronError::new(rule, reason))?;
        }

        Ok(Self {
            source: parts.join(" "),
            minutes: masks[0],
            hours: masks[1],
            days: masks[2],
            months: masks[3],
            weekdays: masks[4],
        })
    }

    /// The normalized rule text
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the rule fires during the minute containing `at`
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        bit(self.minutes, at.minute())
            && bit(self.hours, at.hour())
            && bit(self.days, at.day())
            && bit(self.months, at.month())
            && bit(self.weekdays, at.weekday().num_days_from_sunday())
    }

    /// First matching minute strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut candidate = floor_minute(after) + Duration::minutes(1);
        for _ in 0..SEARCH_LIMIT_MINUTES {
            if self.matches(candidate) {
                return Some(candidate);
            }
            candidate += Duration::minutes(1);
        }
        None
    }
}

impl FromStr for Crontab {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Crontab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl fmt::Debug for Crontab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Crontab").field(&self.source).finish()
    }
}

/// Truncate to the start of the minute
pub(crate) fn floor_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(Duration::minutes(1)).unwrap_or(at)
}

fn bit(mask: u64, value: u32) -> bool {
    mask & (1u64 << value) != 0
}

fn parse_field(field: &str, spec: FieldSpec) -> Result<u64, String> {
    let mut mask = 0u64;
    for item in field.split(',') {
        mask |= parse_item(item, spec)?;
    }
    Ok(mask)
}

fn parse_item(item: &str, spec: FieldSpec) -> Result<u64, String> {
    let (range, step) = match item.split_once('/') {
        Some((range, step)) => {
            let step: u32 = step
                .parse()
                .map_err(|_| format!("bad step '{}' in {} field", step, spec.name))?;
            if step == 0 {
                return Err(format!("step must be positive in {} field", spec.name));
            }
            (range, step)
        }
        None => (item, 1),
    };

    let (start, end) = if range == "*" {
        (spec.min, spec.max)
    } else if let Some((a, b)) = range.split_once('-') {
        let a = parse_value(a, spec)?;
        let b = parse_value(b, spec)?;
        if a > b {
            return Err(format!("range {}-{} is reversed in {} field", a, b, spec.name));
        }
        (a, b)
    } else {
        let n = parse_value(range, spec)?;
        if step != 1 {
            return Err(format!("step needs a range or '*' in {} field", spec.name));
        }
        (n, n)
    };

    Ok((start..=end)
        .step_by(step as usize)
        .fold(0u64, |mask, v| mask | (1u64 << v)))
}

fn parse_value(text: &str, spec: FieldSpec) -> Result<u32, String> {
    let n: u32 = text
        .parse()
        .map_err(|_| format!("'{}' is not a number in {} field", text, spec.name))?;
    if n < spec.min || n > spec.max {
        return Err(format!(
            "{} out of range {}-{} in {} field",
            n, spec.min, spec.max, spec.name
        ));
    }
    Ok(n)
}

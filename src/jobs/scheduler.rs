//! Periodic scheduler
//!
//! A timer loop that wakes every `tick_secs`, walks each whole minute since
//! the previous wake-up and enqueues the jobs whose rules match.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::crontab::{floor_minute, Crontab};
use super::dispatcher::{Dispatcher, JobHandle};
use super::{JobError, DAILY_DEPARTMENT_REPORT, WEEKLY_SALARY_REPORT};
use crate::config::{JobsConfig, ScheduleConfig, MAX_TICK_SECS};

/// Most minutes replayed after a stall
const MAX_CATCH_UP_MINUTES: i64 = 60;

/// One row of the schedule table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub job: String,
    pub rule: Crontab,
}

impl ScheduleEntry {
    pub fn new(job: impl Into<String>, rule: &str) -> Result<Self, JobError> {
        Ok(Self {
            job: job.into(),
            rule: Crontab::parse(rule)?,
        })
    }
}

const DEFAULT_SCHEDULE: [(&str, &str); 2] = [
    (DAILY_DEPARTMENT_REPORT, "0 0 * * *"),
    (WEEKLY_SALARY_REPORT, "0 9 * * 1"),
];

/// Daily department report at midnight, weekly salary report Mondays at 09:00
pub fn default_schedule() -> Vec<ScheduleEntry> {
    DEFAULT_SCHEDULE
        .iter()
        .filter_map(|(job, rule)| ScheduleEntry::new(*job, rule).ok())
        .collect()
}

pub struct Scheduler {
    entries: Vec<ScheduleEntry>,
    dispatcher: Dispatcher,
    tick: Duration,
}

impl Scheduler {
    /// Every entry must name a registered job
    pub fn new(
        entries: Vec<ScheduleEntry>,
        dispatcher: Dispatcher,
        tick: Duration,
    ) -> Result<Self, JobError> {
        if let Some(entry) = entries
            .iter()
            .find(|e| !dispatcher.registry().contains(&e.job))
        {
            return Err(JobError::UnknownJob(entry.job.clone()));
        }
        Ok(Self {
            entries,
            dispatcher,
            tick: tick.clamp(Duration::from_secs(1), Duration::from_secs(MAX_TICK_SECS)),
        })
    }

    /// Build from the `[[schedule]]` table, falling back to [`default_schedule`] when empty
    pub fn from_config(
        schedule: &[ScheduleConfig],
        jobs: &JobsConfig,
        dispatcher: Dispatcher,
    ) -> Result<Self, JobError> {
        let entries = if schedule.is_empty() {
            default_schedule()
        } else {
            schedule
                .iter()
                .map(|s| ScheduleEntry::new(s.job.clone(), &s.cron))
                .collect::<Result<Vec<_>, _>>()?
        };
        Self::new(entries, dispatcher, Duration::from_secs(jobs.tick_secs))
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// Entries whose rule matches `minute`
    pub fn due(&self, minute: DateTime<Utc>) -> impl Iterator<Item = &ScheduleEntry> {
        self.entries.iter().filter(move |e| e.rule.matches(minute))
    }

    /// Enqueue every job due at `minute`
    pub fn fire_due(&self, minute: DateTime<Utc>) -> Vec<JobHandle> {
        let mut handles = Vec::new();
        for entry in self.due(minute) {
            match self.dispatcher.enqueue(&entry.job, Value::Null) {
                Ok(handle) => {
                    info!(job = %entry.job, rule = %entry.rule, %minute, "Scheduled job triggered");
                    handles.push(handle);
                }
                Err(e) => warn!(job = %entry.job, error = %e, "Failed to enqueue scheduled job"),
            }
        }
        handles
    }

    /// Run the timer loop until `shutdown` flips to true or its sender is dropped
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let started = Utc::now();
            for entry in &self.entries {
                match entry.rule.next_after(started) {
                    Some(next) => info!(job = %entry.job, rule = %entry.rule, %next, "Job scheduled"),
                    None => warn!(job = %entry.job, rule = %entry.rule, "Rule never fires"),
                }
            }

            let mut interval = tokio::time::interval(self.tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last = started;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let now = Utc::now();
                        for minute in minutes_between(last, now) {
                            self.fire_due(minute);
                        }
                        last = now;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Scheduler stopped");
        })
    }
}

/// Whole minutes in `(last, now]`, keeping only the most recent
/// `MAX_CATCH_UP_MINUTES` after a long gap.
pub(crate) fn minutes_between(last: DateTime<Utc>, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let last = floor_minute(last);
    let now = floor_minute(now);
    if now <= last {
        return Vec::new();
    }
    let span = (now - last).num_minutes();
    if span > MAX_CATCH_UP_MINUTES {
        warn!(skipped = span - MAX_CATCH_UP_MINUTES, "Scheduler fell behind, skipping old minutes");
    }
    let count = span.min(MAX_CATCH_UP_MINUTES);
    (0..count)
        .rev()
        .map(|back| now - chrono::Duration::minutes(back))
        .collect()
}

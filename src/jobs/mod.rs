//! Background job system
//!
//! Jobs are registered by name in a [`JobRegistry`], queued through a
//! [`Dispatcher`] that drains a bounded channel with a small worker pool, and
//! triggered on a timer by the [`Scheduler`] according to cron rules.

mod crontab;
mod dispatcher;
mod registry;
mod scheduler;
pub mod tasks;

use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;

use crate::reports::{DepartmentHeadcount, DepartmentSalary};

pub use crontab::{CronError, Crontab};
pub use dispatcher::{Dispatcher, JobHandle, JobRecord, JobState, JobStatus};
pub use registry::{Job, JobClass, JobContext, JobRegistry};
pub use scheduler::{default_schedule, ScheduleEntry, Scheduler};

pub const SEND_WELCOME_EMAIL: &str = "send_welcome_email";
pub const GENERATE_EMPLOYEE_REPORT: &str = "generate_employee_report";
pub const EXPORT_EMPLOYEES_CSV: &str = "export_employees_csv";
pub const DAILY_DEPARTMENT_REPORT: &str = "daily_department_report";
pub const WEEKLY_SALARY_REPORT: &str = "weekly_salary_report";

/// Job system errors
#[derive(Error, Debug)]
pub enum JobError {
    #[error("unknown job: {0}")]
    UnknownJob(String),

    #[error("invalid job arguments: {0}")]
    InvalidArgs(String),

    #[error("job queue is full")]
    QueueFull,

    #[error("job queue is closed")]
    QueueClosed,

    #[error("job panicked: {0}")]
    Panicked(String),

    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error(transparent)]
    Cron(#[from] CronError),
}

impl JobError {
    /// Errors caused by the caller rather than the job system
    pub fn is_client_error(&self) -> bool {
        matches!(self, JobError::UnknownJob(_) | JobError::InvalidArgs(_))
    }
}

/// Value produced by a finished job
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum JobOutput {
    Message(String),
    Csv(String),
    DepartmentReport(Vec<DepartmentHeadcount>),
    SalaryReport(Vec<DepartmentSalary>),
}

impl JobOutput {
    /// Short description kept in job records
    pub fn summary(&self) -> String {
        match self {
            JobOutput::Message(msg) => msg.clone(),
            JobOutput::Csv(text) => format!("CSV export with {} lines", text.lines().count()),
            JobOutput::DepartmentReport(rows) => {
                format!("Department report for {} departments", rows.len())
            }
            JobOutput::SalaryReport(rows) => {
                format!("Salary report for {} departments", rows.len())
            }
        }
    }
}

/// Registry holding every built-in job
pub fn default_registry() -> JobRegistry {
    let mut registry = JobRegistry::new();
    registry
        .register(tasks::SendWelcomeEmail)
        .register(tasks::GenerateEmployeeReport)
        .register(tasks::ExportEmployeesCsv)
        .register(tasks::DailyDepartmentReport)
        .register(tasks::WeeklySalaryReport);
    registry
}

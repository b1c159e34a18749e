//! Built-in jobs
//!
//! Each job has a plain async function doing the work and a small unit
//! struct registering it under its name.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

use super::registry::{Job, JobClass, JobContext};
use super::{
    JobError, JobOutput, DAILY_DEPARTMENT_REPORT, EXPORT_EMPLOYEES_CSV, GENERATE_EMPLOYEE_REPORT,
    SEND_WELCOME_EMAIL, WEEKLY_SALARY_REPORT,
};
use crate::entity::employee::EmployeeStatus;
use crate::reports::{employees_csv, DepartmentHeadcount, DepartmentSalary};
use crate::repository::{DepartmentRepository, EmployeeRepository};

const WELCOME_SUBJECT: &str = "Welcome to our company!";

/// Arguments of the per-employee jobs
#[derive(Debug, Clone, Deserialize)]
pub struct EmployeeArgs {
    pub employee_id: i32,
}

impl EmployeeArgs {
    pub fn parse(args: Value) -> Result<Self, JobError> {
        serde_json::from_value(args).map_err(|e| JobError::InvalidArgs(e.to_string()))
    }
}

fn employee_not_found(id: i32) -> JobOutput {
    error!(employee_id = id, "Employee not found");
    JobOutput::Message(format!("Error: Employee with id {} not found", id))
}

pub async fn send_welcome_email(db: &DatabaseConnection, id: i32) -> Result<JobOutput, JobError> {
    let Some(employee) = EmployeeRepository::find_by_id(db, id).await? else {
        return Ok(employee_not_found(id));
    };

    // no mail transport; the send is logged only
    info!("Sending welcome email to {}", employee.email);
    info!(
        "Email sent to {} with subject '{}'",
        employee.email, WELCOME_SUBJECT
    );
    Ok(JobOutput::Message(format!(
        "Welcome email sent to {}",
        employee.email
    )))
}

pub async fn generate_employee_report(
    db: &DatabaseConnection,
    id: i32,
) -> Result<JobOutput, JobError> {
    match EmployeeRepository::mark_report_generated(db, id, Utc::now()).await? {
        Some(employee) => {
            info!(employee_id = id, "Report generated for {}", employee.full_name());
            Ok(JobOutput::Message(format!(
                "Report generated for {}",
                employee.full_name()
            )))
        }
        None => Ok(employee_not_found(id)),
    }
}

pub async fn export_employees_csv(db: &DatabaseConnection) -> Result<JobOutput, JobError> {
    let rows = EmployeeRepository::all_with_departments(db).await?;
    Ok(JobOutput::Csv(employees_csv(&rows)))
}

/// Active and on-leave headcount per department
pub async fn daily_department_report(
    db: &DatabaseConnection,
) -> Result<Vec<DepartmentHeadcount>, JobError> {
    let mut report = Vec::new();
    for dept in DepartmentRepository::all(db).await? {
        let active =
            EmployeeRepository::count_by_department_and_status(db, dept.id, EmployeeStatus::Active)
                .await?;
        let on_leave = EmployeeRepository::count_by_department_and_status(
            db,
            dept.id,
            EmployeeStatus::OnLeave,
        )
        .await?;
        report.push(DepartmentHeadcount::new(dept.name, active, on_leave));
    }

    info!(departments = report.len(), "Daily department report");
    for row in &report {
        info!(
            department = %row.department,
            active = row.active_employees,
            on_leave = row.on_leave_employees,
            total = row.total_employees,
            "Department headcount"
        );
    }
    Ok(report)
}

/// Salary total and average over active employees per department
pub async fn weekly_salary_report(
    db: &DatabaseConnection,
) -> Result<Vec<DepartmentSalary>, JobError> {
    let mut report = Vec::new();
    for dept in DepartmentRepository::all(db).await? {
        let (total, count) =
            EmployeeRepository::sum_salary_by_department(db, dept.id, EmployeeStatus::Active)
                .await?;
        report.push(DepartmentSalary::new(dept.name, total, count));
    }

    info!(departments = report.len(), "Weekly salary report");
    for row in &report {
        info!(
            department = %row.department,
            total = %row.total_salary,
            average = %row.average_salary,
            employees = row.employee_count,
            "Department salaries"
        );
    }
    Ok(report)
}

pub struct SendWelcomeEmail;

#[async_trait]
impl Job for SendWelcomeEmail {
    fn name(&self) -> &'static str {
        SEND_WELCOME_EMAIL
    }

    async fn run(&self, ctx: &JobContext, args: Value) -> Result<JobOutput, JobError> {
        let args = EmployeeArgs::parse(args)?;
        send_welcome_email(&ctx.db, args.employee_id).await
    }
}

pub struct GenerateEmployeeReport;

#[async_trait]
impl Job for GenerateEmployeeReport {
    fn name(&self) -> &'static str {
        GENERATE_EMPLOYEE_REPORT
    }

    fn class(&self) -> JobClass {
        JobClass::PersistenceBound
    }

    async fn run(&self, ctx: &JobContext, args: Value) -> Result<JobOutput, JobError> {
        let args = EmployeeArgs::parse(args)?;
        generate_employee_report(&ctx.db, args.employee_id).await
    }
}

pub struct ExportEmployeesCsv;

#[async_trait]
impl Job for ExportEmployeesCsv {
    fn name(&self) -> &'static str {
        EXPORT_EMPLOYEES_CSV
    }

    async fn run(&self, ctx: &JobContext, _args: Value) -> Result<JobOutput, JobError> {
        export_employees_csv(&ctx.db).await
    }
}

pub struct DailyDepartmentReport;

#[async_trait]
impl Job for DailyDepartmentReport {
    fn name(&self) -> &'static str {
        DAILY_DEPARTMENT_REPORT
    }

    async fn run(&self, ctx: &JobContext, _args: Value) -> Result<JobOutput, JobError> {
        daily_department_report(&ctx.db)
            .await
            .map(JobOutput::DepartmentReport)
    }
}

pub struct WeeklySalaryReport;

#[async_trait]
impl Job for WeeklySalaryReport {
    fn name(&self) -> &'static str {
        WEEKLY_SALARY_REPORT
    }

    async fn run(&self, ctx: &JobContext, _args: Value) -> Result<JobOutput, JobError> {
        weekly_salary_report(&ctx.db)
            .await
            .map(JobOutput::SalaryReport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::jobs::{default_registry, Dispatcher, JobState};
    use crate::config::JobsConfig;
    use crate::repository::test_support::{insert_employee, seed_department};
    use rust_decimal::Decimal;
    use serde_json::json;

    #[tokio::test]
    async fn test_welcome_email() {
        let db = test_db().await;
        let emp = insert_employee(&db, "grace@example.com", None, EmployeeStatus::Active).await;
        let output = send_welcome_email(&db, emp.id).await.unwrap();
        assert_eq!(
            output,
            JobOutput::Message("Welcome email sent to grace@example.com".to_string())
        );
        let missing = send_welcome_email(&db, emp.id + 100).await.unwrap();
        assert_eq!(
            missing,
            JobOutput::Message(format!("Error: Employee with id {} not found", emp.id + 100))
        );
    }

    #[tokio::test]
    async fn test_report_stamps_timestamp() {
        let db = test_db().await;
        let emp = insert_employee(&db, "grace@example.com", None, EmployeeStatus::Active).await;
        assert!(emp.last_report_generated.is_none());

        let before = Utc::now();
        let output = generate_employee_report(&db, emp.id).await.unwrap();
        let after = Utc::now();
        assert_eq!(
            output,
            JobOutput::Message("Report generated for Grace Hopper".to_string())
        );

        let stamped = EmployeeRepository::find_by_id(&db, emp.id)
            .await
            .unwrap()
            .unwrap()
            .last_report_generated
            .unwrap();
        assert!(stamped >= before && stamped <= after);
    }

    #[tokio::test]
    async fn test_report_for_missing_employee_changes_nothing() {
        let db = test_db().await;
        let emp = insert_employee(&db, "grace@example.com", None, EmployeeStatus::Active).await;
        let output = generate_employee_report(&db, emp.id + 1).await.unwrap();
        assert_eq!(
            output,
            JobOutput::Message(format!("Error: Employee with id {} not found", emp.id + 1))
        );
        let unchanged = EmployeeRepository::find_by_id(&db, emp.id).await.unwrap().unwrap();
        assert!(unchanged.last_report_generated.is_none());
    }

    #[tokio::test]
    async fn test_daily_department_report_counts() {
        let db = test_db().await;
        let eng = seed_department(&db, "Engineering").await;
        let ops = seed_department(&db, "Operations").await;
        for i in 0..3 {
            insert_employee(&db, &format!("a{}@example.com", i), Some(eng.id), EmployeeStatus::Active).await;
        }
        insert_employee(&db, "leave@example.com", Some(eng.id), EmployeeStatus::OnLeave).await;
        insert_employee(&db, "gone@example.com", Some(eng.id), EmployeeStatus::Terminated).await;

        let report = daily_department_report(&db).await.unwrap();
        assert_eq!(
            report,
            vec![
                DepartmentHeadcount::new("Engineering", 3, 1),
                DepartmentHeadcount::new("Operations", 0, 0),
            ]
        );
        assert_eq!(report[0].total_employees, 4);
        assert_eq!(report[1].department, ops.name);
    }

    #[tokio::test]
    async fn test_weekly_salary_report() {
        let db = test_db().await;
        let eng = seed_department(&db, "Engineering").await;
        seed_department(&db, "Empty").await;
        insert_employee(&db, "a@example.com", Some(eng.id), EmployeeStatus::Active).await;
        insert_employee(&db, "b@example.com", Some(eng.id), EmployeeStatus::Active).await;
        insert_employee(&db, "c@example.com", Some(eng.id), EmployeeStatus::OnLeave).await;

        let report = weekly_salary_report(&db).await.unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].employee_count, 2);
        assert_eq!(report[0].total_salary, Decimal::new(10400100, 2));
        assert_eq!(report[0].average_salary, Decimal::new(5200050, 2));
        assert_eq!(report[1].employee_count, 0);
        assert_eq!(report[1].average_salary, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_export_csv_lines() {
        let db = test_db().await;
        let eng = seed_department(&db, "Engineering").await;
        insert_employee(&db, "a@example.com", Some(eng.id), EmployeeStatus::Active).await;
        insert_employee(&db, "b@example.com", None, EmployeeStatus::Active).await;

        let JobOutput::Csv(csv) = export_employees_csv(&db).await.unwrap() else {
            panic!("expected csv output");
        };
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].split(',').nth(4), Some("Engineering"));
        assert_eq!(lines[2].split(',').nth(4), Some(""));
    }

    #[tokio::test]
    async fn test_jobs_through_dispatcher() {
        let db = test_db().await;
        let emp = insert_employee(&db, "grace@example.com", None, EmployeeStatus::Active).await;
        let dispatcher = Dispatcher::start(
            default_registry(),
            JobContext { db: db.clone() },
            &JobsConfig::default(),
        );

        let handle = dispatcher
            .enqueue(GENERATE_EMPLOYEE_REPORT, json!({"employee_id": emp.id}))
            .unwrap();
        assert!(matches!(handle.wait().await, JobState::Succeeded(_)));

        let handle = dispatcher
            .enqueue(SEND_WELCOME_EMAIL, json!({"id": emp.id}))
            .unwrap();
        assert!(matches!(handle.wait().await, JobState::Failed(msg) if msg.starts_with("invalid job arguments")));

        let output = dispatcher.call(EXPORT_EMPLOYEES_CSV, Value::Null).await;
        tokio_test::assert_ok!(output);
    }
}

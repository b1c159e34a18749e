//! Employee handlers
//!
//! List, detail, create, update and delete views plus the report and CSV
//! export actions. Creating an employee queues the welcome email.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Redirect},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::{Validate, ValidationError};

use crate::entity::department::DepartmentResponse;
use crate::entity::employee::{EmployeeResponse, EmployeeStatus};
use crate::entity::employee;
use crate::error::{conflict_on_unique, AppError, AppResult, OptionExt};
use crate::jobs::{JobOutput, EXPORT_EMPLOYEES_CSV, GENERATE_EMPLOYEE_REPORT, SEND_WELCOME_EMAIL};
use crate::repository::{
    DepartmentRepository, EmployeeChanges, EmployeeFilter, EmployeeRepository, NewEmployee,
};
use crate::routes::ApiResponse;
use crate::state::AppState;

/// Header carrying the id of the job an action queued
pub const JOB_ID_HEADER: &str = "x-job-id";

const EMAIL_TAKEN: &str = "Employee with this email already exists";

/// Salary fits numeric(10, 2)
const MAX_SALARY: Decimal = Decimal::from_parts(99_999_999, 0, 0, false, 0);

fn validate_salary(salary: &Decimal) -> Result<(), ValidationError> {
    if salary.is_sign_negative() && !salary.is_zero() {
        return Err(ValidationError::new("range").with_message("must not be negative".into()));
    }
    if salary.normalize().scale() > 2 {
        return Err(ValidationError::new("scale").with_message("at most 2 decimal places".into()));
    }
    if salary.trunc() > MAX_SALARY {
        return Err(ValidationError::new("range").with_message("at most 10 digits".into()));
    }
    Ok(())
}

/// Body of POST /employees/create/
#[derive(Debug, Deserialize, Validate)]
pub struct CreateEmployeeRequest {
    #[validate(length(min = 1, max = 100, message = "must be 1 to 100 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "must be 1 to 100 characters"))]
    pub last_name: String,
    #[validate(
        email(message = "must be a valid email address"),
        length(max = 254, message = "must be at most 254 characters")
    )]
    pub email: String,
    pub department_id: Option<i32>,
    #[validate(length(min = 1, max = 100, message = "must be 1 to 100 characters"))]
    pub position: String,
    pub hire_date: NaiveDate,
    #[serde(default)]
    pub status: EmployeeStatus,
    #[validate(custom(function = validate_salary))]
    pub salary: Decimal,
}

/// Body of POST /employees/{id}/update/. The hire date is not editable.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateEmployeeRequest {
    #[validate(length(min = 1, max = 100, message = "must be 1 to 100 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "must be 1 to 100 characters"))]
    pub last_name: String,
    #[validate(
        email(message = "must be a valid email address"),
        length(max = 254, message = "must be at most 254 characters")
    )]
    pub email: String,
    pub department_id: Option<i32>,
    #[validate(length(min = 1, max = 100, message = "must be 1 to 100 characters"))]
    pub position: String,
    pub status: EmployeeStatus,
    #[validate(custom(function = validate_salary))]
    pub salary: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub status: Option<EmployeeStatus>,
    pub department: Option<i32>,
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EmployeeListResponse {
    pub items: Vec<EmployeeResponse>,
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub num_pages: u64,
}

#[derive(Debug, Serialize)]
pub struct StatusChoice {
    pub value: &'static str,
    pub label: &'static str,
}

/// Choices a client needs to render the employee form
#[derive(Debug, Serialize)]
pub struct EmployeeFormSchema {
    pub statuses: Vec<StatusChoice>,
    pub departments: Vec<DepartmentResponse>,
}

#[derive(Debug, Serialize)]
pub struct EmployeeEditResponse {
    pub employee: EmployeeResponse,
    pub form: EmployeeFormSchema,
}

#[derive(Debug, Serialize)]
pub struct DeleteConfirmation {
    pub id: i32,
    pub full_name: String,
    pub email: String,
}

async fn form_schema(db: &DatabaseConnection) -> AppResult<EmployeeFormSchema> {
    let statuses = [
        EmployeeStatus::Active,
        EmployeeStatus::OnLeave,
        EmployeeStatus::Terminated,
    ]
    .into_iter()
    .map(|s| StatusChoice {
        value: s.as_str(),
        label: s.label(),
    })
    .collect();
    let departments = DepartmentRepository::all(db)
        .await?
        .into_iter()
        .map(DepartmentResponse::from)
        .collect();
    Ok(EmployeeFormSchema {
        statuses,
        departments,
    })
}

async fn ensure_department(db: &DatabaseConnection, department_id: Option<i32>) -> AppResult<()> {
    if let Some(id) = department_id {
        if DepartmentRepository::find_by_id(db, id).await?.is_none() {
            return Err(AppError::Validation(format!(
                "department_id: department {} does not exist",
                id
            )));
        }
    }
    Ok(())
}

async fn load_employee(db: &DatabaseConnection, id: i32) -> AppResult<employee::Model> {
    EmployeeRepository::find_by_id(db, id)
        .await?
        .ok_or_not_found(format!("Employee {} not found", id))
}

/// GET /employees/
pub async fn list_employees(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> AppResult<Json<ApiResponse<EmployeeListResponse>>> {
    let Query(query) = query?;
    let filter = EmployeeFilter {
        status: query.status,
        department_id: query.department,
        search: query.q,
    };
    let page = query.page.unwrap_or(1);
    let result = EmployeeRepository::list_page(&state.db, &filter, page, state.config.page_size)
        .await?
        .ok_or_not_found(format!("Invalid page ({})", page))?;

    Ok(Json(ApiResponse::success(EmployeeListResponse {
        items: result
            .rows
            .into_iter()
            .map(|(emp, dept)| EmployeeResponse::new(emp, dept))
            .collect(),
        page: result.page,
        page_size: result.page_size,
        total: result.total,
        num_pages: result.num_pages,
    })))
}

/// GET /employees/{id}/
pub async fn get_employee(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<EmployeeResponse>>> {
    let (emp, dept) = EmployeeRepository::find_with_department(&state.db, id)
        .await?
        .ok_or_not_found(format!("Employee {} not found", id))?;
    Ok(Json(ApiResponse::success(EmployeeResponse::new(emp, dept))))
}

/// GET /employees/create/
pub async fn create_form(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<EmployeeFormSchema>>> {
    Ok(Json(ApiResponse::success(form_schema(&state.db).await?)))
}

/// POST /employees/create/
pub async fn create_employee(
    State(state): State<AppState>,
    payload: Result<Json<CreateEmployeeRequest>, JsonRejection>,
) -> AppResult<(StatusCode, HeaderMap, Json<ApiResponse<EmployeeResponse>>)> {
    let Json(req) = payload?;
    req.validate()?;
    ensure_department(&state.db, req.department_id).await?;
    if EmployeeRepository::email_taken(&state.db, &req.email, None).await? {
        return Err(AppError::Conflict(EMAIL_TAKEN.to_string()));
    }

    let new = NewEmployee {
        first_name: req.first_name,
        last_name: req.last_name,
        email: req.email,
        department_id: req.department_id,
        position: req.position,
        hire_date: req.hire_date,
        status: req.status,
        salary: req.salary,
    };
    let emp = EmployeeRepository::create(&state.db, new)
        .await
        .map_err(|e| conflict_on_unique(e, EMAIL_TAKEN))?;
    tracing::info!(employee_id = emp.id, email = %emp.email, "Employee created");

    let mut headers = HeaderMap::new();
    match state
        .jobs
        .enqueue(SEND_WELCOME_EMAIL, json!({ "employee_id": emp.id }))
    {
        Ok(handle) => {
            if let Ok(value) = HeaderValue::from_str(&handle.id.to_string()) {
                headers.insert(HeaderName::from_static(JOB_ID_HEADER), value);
            }
        }
        Err(e) => {
            tracing::warn!(employee_id = emp.id, error = %e, "Could not queue welcome email");
        }
    }

    let message = format!("Employee {} created. Welcome email queued.", emp.full_name());
    let dept = match emp.department_id {
        Some(id) => DepartmentRepository::find_by_id(&state.db, id).await?,
        None => None,
    };
    Ok((
        StatusCode::CREATED,
        headers,
        Json(ApiResponse::with_message(message, EmployeeResponse::new(emp, dept))),
    ))
}

/// GET /employees/{id}/update/
pub async fn edit_form(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<EmployeeEditResponse>>> {
    let (emp, dept) = EmployeeRepository::find_with_department(&state.db, id)
        .await?
        .ok_or_not_found(format!("Employee {} not found", id))?;
    Ok(Json(ApiResponse::success(EmployeeEditResponse {
        employee: EmployeeResponse::new(emp, dept),
        form: form_schema(&state.db).await?,
    })))
}

/// POST /employees/{id}/update/
pub async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    payload: Result<Json<UpdateEmployeeRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<EmployeeResponse>>> {
    let Json(req) = payload?;
    req.validate()?;
    ensure_department(&state.db, req.department_id).await?;
    if EmployeeRepository::email_taken(&state.db, &req.email, Some(id)).await? {
        return Err(AppError::Conflict(EMAIL_TAKEN.to_string()));
    }

    let changes = EmployeeChanges {
        first_name: req.first_name,
        last_name: req.last_name,
        email: req.email,
        department_id: req.department_id,
        position: req.position,
        status: req.status,
        salary: req.salary,
    };
    let emp = EmployeeRepository::update(&state.db, id, changes)
        .await
        .map_err(|e| conflict_on_unique(e, EMAIL_TAKEN))?
        .ok_or_not_found(format!("Employee {} not found", id))?;

    let message = format!("Employee {} updated.", emp.full_name());
    let dept = match emp.department_id {
        Some(dept_id) => DepartmentRepository::find_by_id(&state.db, dept_id).await?,
        None => None,
    };
    Ok(Json(ApiResponse::with_message(message, EmployeeResponse::new(emp, dept))))
}

/// GET /employees/{id}/delete/
pub async fn delete_confirmation(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<DeleteConfirmation>>> {
    let emp = load_employee(&state.db, id).await?;
    Ok(Json(ApiResponse::with_message(
        format!("Delete employee {}?", emp.full_name()),
        DeleteConfirmation {
            id: emp.id,
            full_name: emp.full_name(),
            email: emp.email,
        },
    )))
}

/// POST /employees/{id}/delete/
pub async fn delete_employee(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<()>>> {
    let emp = load_employee(&state.db, id).await?;
    if !EmployeeRepository::delete(&state.db, id).await? {
        return Err(AppError::NotFound(format!("Employee {} not found", id)));
    }
    tracing::info!(employee_id = id, "Employee deleted");
    Ok(Json(ApiResponse::success_msg(format!(
        "Employee {} deleted.",
        emp.full_name()
    ))))
}

/// GET|POST /employees/{id}/report/
///
/// Queues the report job and redirects to the detail view.
pub async fn generate_report(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let emp = load_employee(&state.db, id).await?;
    let handle = state
        .jobs
        .enqueue(GENERATE_EMPLOYEE_REPORT, json!({ "employee_id": emp.id }))?;
    tracing::info!(employee_id = id, job_id = %handle.id, "Report generation started");

    Ok((
        [(JOB_ID_HEADER, handle.id.to_string())],
        Redirect::to(&format!("/employees/{}/", id)),
    ))
}

/// GET /employees/export-csv/
///
/// Runs the export job inline and returns its text as a download.
pub async fn export_csv(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let csv = match state.jobs.call(EXPORT_EMPLOYEES_CSV, Value::Null).await? {
        JobOutput::Csv(text) => text,
        other => {
            return Err(AppError::Internal(format!(
                "export produced unexpected output: {}",
                other.summary()
            )))
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"employees.csv\"",
            ),
        ],
        csv,
    ))
}

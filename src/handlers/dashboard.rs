//! Dashboard handler

use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::entity::department::DepartmentResponse;
use crate::entity::employee::EmployeeStatus;
use crate::error::AppResult;
use crate::repository::{DepartmentRepository, EmployeeRepository};
use crate::routes::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub total_employees: u64,
    pub active_employees: u64,
    pub departments: Vec<DepartmentResponse>,
}

/// GET /
pub async fn dashboard(State(state): State<AppState>) -> AppResult<Json<ApiResponse<DashboardResponse>>> {
    let total_employees = EmployeeRepository::count_all(&state.db).await?;
    let active_employees = EmployeeRepository::count_by_status(&state.db, EmployeeStatus::Active).await?;
    let departments = DepartmentRepository::all(&state.db)
        .await?
        .into_iter()
        .map(DepartmentResponse::from)
        .collect();

    Ok(Json(ApiResponse::success(DashboardResponse {
        total_employees,
        active_employees,
        departments,
    })))
}

//! Department handlers
//!
//! Implements department CRUD operations. Deleting a department keeps its
//! employees and clears their department.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::entity::department::{self, DepartmentResponse};
use crate::error::{AppResult, OptionExt};
use crate::repository::DepartmentRepository;
use crate::routes::ApiResponse;
use crate::state::AppState;

/// Create and update request body
#[derive(Debug, Deserialize, Validate)]
pub struct DepartmentRequest {
    #[validate(length(min = 1, max = 100, message = "must be 1 to 100 characters"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Query parameters for the list
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DepartmentDeleted {
    pub id: i32,
    pub unassigned_employees: u64,
}

async fn load_department(state: &AppState, id: i32) -> AppResult<department::Model> {
    DepartmentRepository::find_by_id(&state.db, id)
        .await?
        .ok_or_not_found(format!("Department {} not found", id))
}

/// GET /departments/
pub async fn list_departments(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> AppResult<Json<ApiResponse<Vec<DepartmentResponse>>>> {
    let Query(query) = query?;
    let departments = DepartmentRepository::search(&state.db, query.q.as_deref())
        .await?
        .into_iter()
        .map(DepartmentResponse::from)
        .collect();
    Ok(Json(ApiResponse::success(departments)))
}

/// POST /departments/create/
pub async fn create_department(
    State(state): State<AppState>,
    payload: Result<Json<DepartmentRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<DepartmentResponse>>)> {
    let Json(req) = payload?;
    req.validate()?;
    let dept = DepartmentRepository::create(&state.db, &req.name, &req.description).await?;
    tracing::info!(department_id = dept.id, name = %dept.name, "Department created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            format!("Department {} created.", dept.name),
            DepartmentResponse::from(dept),
        )),
    ))
}

/// GET /departments/{id}/update/
pub async fn edit_department(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<DepartmentResponse>>> {
    let dept = load_department(&state, id).await?;
    Ok(Json(ApiResponse::success(DepartmentResponse::from(dept))))
}

/// POST /departments/{id}/update/
pub async fn update_department(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    payload: Result<Json<DepartmentRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<DepartmentResponse>>> {
    let Json(req) = payload?;
    req.validate()?;
    let dept = DepartmentRepository::update(&state.db, id, &req.name, &req.description)
        .await?
        .ok_or_not_found(format!("Department {} not found", id))?;
    Ok(Json(ApiResponse::with_message(
        format!("Department {} updated.", dept.name),
        DepartmentResponse::from(dept),
    )))
}

/// GET /departments/{id}/delete/
pub async fn delete_confirmation(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<DepartmentResponse>>> {
    let dept = load_department(&state, id).await?;
    Ok(Json(ApiResponse::with_message(
        format!(
            "Delete department {}? Its employees will be kept without a department.",
            dept.name
        ),
        DepartmentResponse::from(dept),
    )))
}

/// POST /departments/{id}/delete/
pub async fn delete_department(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<DepartmentDeleted>>> {
    let dept = load_department(&state, id).await?;
    let unassigned = DepartmentRepository::delete(&state.db, id)
        .await?
        .ok_or_not_found(format!("Department {} not found", id))?;
    tracing::info!(department_id = id, unassigned, "Department deleted");
    Ok(Json(ApiResponse::with_message(
        format!("Department {} deleted.", dept.name),
        DepartmentDeleted {
            id,
            unassigned_employees: unassigned,
        },
    )))
}

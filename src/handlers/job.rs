use axum::{
    extract::{Path, State},
    response::Json,
};
use uuid::Uuid;

use crate::error::{AppResult, OptionExt};
use crate::jobs::JobRecord;
use crate::routes::ApiResponse;
use crate::state::AppState;

/// GET /jobs/{id}/
///
/// Unknown ids and records already evicted both yield 404.
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<JobRecord>>> {
    let record = state
        .jobs
        .record(&id)
        .ok_or_not_found(format!("Job {} not found", id))?;
    Ok(Json(ApiResponse::success(record)))
}

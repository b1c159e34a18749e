use axum::{
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers;
use crate::state::AppState;

pub mod health;

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self::with_message("success", data)
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            code: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: false,
            message: message.into(),
            data: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn success_msg(message: impl Into<String>) -> Self {
        Self {
            code: true,
            message: message.into(),
            data: None,
        }
    }
}

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::dashboard::dashboard))
        .route("/health", get(health::health_check))
        // Employee routes
        .route("/employees/", get(handlers::employee::list_employees))
        .route("/employees/export-csv/", get(handlers::employee::export_csv))
        .route(
            "/employees/create/",
            get(handlers::employee::create_form).post(handlers::employee::create_employee),
        )
        .route("/employees/:id/", get(handlers::employee::get_employee))
        .route(
            "/employees/:id/update/",
            get(handlers::employee::edit_form).post(handlers::employee::update_employee),
        )
        .route(
            "/employees/:id/delete/",
            get(handlers::employee::delete_confirmation).post(handlers::employee::delete_employee),
        )
        .route(
            "/employees/:id/report/",
            get(handlers::employee::generate_report).post(handlers::employee::generate_report),
        )
        // Department routes
        .route("/departments/", get(handlers::department::list_departments))
        .route("/departments/create/", post(handlers::department::create_department))
        .route(
            "/departments/:id/update/",
            get(handlers::department::edit_department).post(handlers::department::update_department),
        )
        .route(
            "/departments/:id/delete/",
            get(handlers::department::delete_confirmation)
                .post(handlers::department::delete_department),
        )
        // Job status
        .route("/jobs/:id/", get(handlers::job::get_job))
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Fallback handler for 404
pub async fn fallback() -> (StatusCode, Json<ApiResponse<()>>) {
    (StatusCode::NOT_FOUND, Json(ApiResponse::error("Not Found")))
}

use std::sync::Arc;

use crate::task::api::v1::{self, TaskJson, TaskState};
use crate::task::{NewTask, TaskPatch};

use axum::{Json, Router, routing::get};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

/// JSON response for API errors
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine readable error code
    pub error: String,
    /// Human readable description
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        v1::create_task_handler,
        v1::list_tasks_handler,
        v1::get_task_handler,
        v1::update_task_handler,
        v1::complete_task_handler,
        v1::delete_task_handler,
    ),
    components(schemas(TaskJson, NewTask, TaskPatch, ErrorResponse)),
    tags((name = "Tasks", description = "Task management endpoints"))
)]
pub struct ApiDoc;

/// Creates the API routes for JSON API endpoints.
pub fn create_api_router(task_state: Arc<TaskState>) -> Router {
    let tasks_router = v1::create_api_router(task_state);
    Router::new()
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .merge(tasks_router)
}

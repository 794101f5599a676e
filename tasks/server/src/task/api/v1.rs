use crate::task::repository::SeaOrmTaskRepository;
use crate::task::{ErrorKind, NewTask, Task, TaskPatch, TaskService, TaskServiceError};
use crate::web::api::ErrorResponse;
use axum::{
    Json, Router,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Clone, Debug)]
pub struct TaskState {
    pub db: Arc<sea_orm::DatabaseConnection>,
}

/// JSON representation of a Task for API responses.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskJson {
    /// Unique identifier assigned on creation
    id: i32,
    /// Unique, non-empty title
    title: String,
    description: Option<String>,
    /// ISO-8601 creation timestamp
    created_at: String,
    /// ISO-8601 completion timestamp, `null` while pending
    completed_at: Option<String>,
    completed: bool,
}

impl From<Task> for TaskJson {
    fn from(task: Task) -> Self {
        Self {
            id: task.id(),
            title: task.title().to_string(),
            description: task.description().map(str::to_string),
            created_at: task.created_at().to_string(),
            completed_at: task.completed_at().map(str::to_string),
            completed: task.completed(),
        }
    }
}

/// Error type for task API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body is not valid JSON or has a field of the wrong type.
    #[error("{}", .0.body_text())]
    InvalidBody(#[from] JsonRejection),
    #[error("Task with ID {0} not found")]
    NotFound(i32),
    /// The path segment is not a valid task ID, so no task can match it.
    #[error("Task not found")]
    InvalidId(#[from] PathRejection),
    #[error(transparent)]
    Service(#[from] TaskServiceError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_code) = match &self {
            ApiError::InvalidBody(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::NotFound(_) | ApiError::InvalidId(_) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND")
            }
            ApiError::Service(TaskServiceError::AlreadyCompleted(_)) => {
                (StatusCode::CONFLICT, "CONFLICT")
            }
            ApiError::Service(err) => match err.kind() {
                ErrorKind::Validation => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                ErrorKind::Conflict => (StatusCode::BAD_REQUEST, "CONFLICT"),
                ErrorKind::Storage => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
        };

        let message = if status_code == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Task request failed: {:?}", self);
            "An unexpected error occurred while processing your request. Please try again later."
                .to_string()
        } else {
            tracing::debug!("Task request rejected: {}", self);
            self.to_string()
        };

        (status_code, Json(ErrorResponse::new(error_code, message))).into_response()
    }
}

fn task_service(state: &TaskState) -> TaskService<SeaOrmTaskRepository<'_>> {
    TaskService::new(SeaOrmTaskRepository::new(&state.db))
}

/// Handler for POST /tasks - Creates a task.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    post,
    path = "/tasks",
    request_body = NewTask,
    responses(
        (status = 201, description = "Task created", body = TaskJson),
        (status = 400, description = "Invalid input or duplicate title", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn create_task_handler(
    State(state): State<Arc<TaskState>>,
    payload: Result<Json<NewTask>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskJson>), ApiError> {
    let Json(input) = payload?;
    let task = task_service(&state).create_task(input).await?;
    Ok((StatusCode::CREATED, Json(TaskJson::from(task))))
}

/// Handler for GET /tasks - Returns all tasks.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/tasks",
    responses(
        (status = 200, description = "Successfully retrieved tasks", body = Vec<TaskJson>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn list_tasks_handler(
    State(state): State<Arc<TaskState>>,
) -> Result<Json<Vec<TaskJson>>, ApiError> {
    let tasks = task_service(&state).list_tasks().await?;
    Ok(Json(tasks.into_iter().map(TaskJson::from).collect()))
}

/// Handler for GET /tasks/{id} - Returns a single task.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/tasks/{id}",
    params(("id" = i32, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task found", body = TaskJson),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn get_task_handler(
    State(state): State<Arc<TaskState>>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<TaskJson>, ApiError> {
    let Path(id) = id?;
    task_service(&state)
        .get_task(id)
        .await?
        .map(|task| Json(TaskJson::from(task)))
        .ok_or(ApiError::NotFound(id))
}

/// Handler for PUT /tasks/{id} - Applies a partial update.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    put,
    path = "/tasks/{id}",
    params(("id" = i32, Path, description = "Task ID")),
    request_body = TaskPatch,
    responses(
        (status = 200, description = "Task updated", body = TaskJson),
        (status = 400, description = "Invalid input, duplicate title or reopen attempt", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn update_task_handler(
    State(state): State<Arc<TaskState>>,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<TaskPatch>, JsonRejection>,
) -> Result<Json<TaskJson>, ApiError> {
    let Path(id) = id?;
    let Json(patch) = payload?;
    task_service(&state)
        .update_task(id, patch)
        .await?
        .map(|task| Json(TaskJson::from(task)))
        .ok_or(ApiError::NotFound(id))
}

/// Handler for PATCH /tasks/{id} - Marks a task as completed.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    patch,
    path = "/tasks/{id}",
    params(("id" = i32, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task completed", body = TaskJson),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 409, description = "Task already completed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn complete_task_handler(
    State(state): State<Arc<TaskState>>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<TaskJson>, ApiError> {
    let Path(id) = id?;
    task_service(&state)
        .complete_task(id)
        .await?
        .map(|task| Json(TaskJson::from(task)))
        .ok_or(ApiError::NotFound(id))
}

/// Handler for DELETE /tasks/{id} - Removes a task.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    delete,
    path = "/tasks/{id}",
    params(("id" = i32, Path, description = "Task ID")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn delete_task_handler(
    State(state): State<Arc<TaskState>>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    if task_service(&state).delete_task(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(id))
    }
}

/// Creates and returns the tasks API router.
pub fn create_api_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route("/tasks", get(list_tasks_handler).post(create_task_handler))
        .route(
            "/tasks/{id}",
            get(get_task_handler)
                .put(update_task_handler)
                .patch(complete_task_handler)
                .delete(delete_task_handler),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::repository::StorageError;
    use sea_orm::DbErr;

    async fn response_parts(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn already_completed_maps_to_conflict_status() {
        let (status, body) =
            response_parts(ApiError::Service(TaskServiceError::AlreadyCompleted(3))).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "CONFLICT");
        assert_eq!(body["message"], "Task with ID 3 is already completed");
    }

    #[tokio::test]
    async fn duplicate_title_maps_to_bad_request() {
        let (status, body) = response_parts(ApiError::Service(TaskServiceError::DuplicateTitle(
            "Buy milk".to_string(),
        )))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "CONFLICT");
    }

    #[tokio::test]
    async fn storage_failure_hides_details() {
        let storage_error = StorageError::Database {
            operation: "list tasks".to_string(),
            source: DbErr::Custom("database is locked".to_string()),
        };

        let (status, body) =
            response_parts(ApiError::Service(TaskServiceError::Storage(storage_error))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "INTERNAL_ERROR");
        assert!(!body["message"].as_str().unwrap().contains("locked"));
    }

    #[test]
    fn task_json_uses_camel_case_and_nulls() {
        let task = Task::new(
            1,
            "Buy milk".to_string(),
            Some("2%".to_string()),
            "2024-01-01T00:00:00Z".to_string(),
            None,
            false,
        );

        let json = serde_json::to_value(TaskJson::from(task)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "id": 1,
                "title": "Buy milk",
                "description": "2%",
                "createdAt": "2024-01-01T00:00:00Z",
                "completedAt": null,
                "completed": false
            })
        );
    }
}

//! REST endpoints for tasks and their history.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::lifecycle::TaskLifecycle;
use super::model::{NewTask, TaskPatch, TaskStatus};
use crate::error::{DatabaseError, Error};
use crate::store::TaskQuery;

/// Shared state for task routes.
#[derive(Clone)]
pub struct TaskRouteState {
    pub lifecycle: Arc<TaskLifecycle>,
}

/// Query string for `GET /tasks`.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub status: Option<TaskStatus>,
}

fn default_limit() -> u32 {
    TaskQuery::default().limit
}

impl From<ListParams> for TaskQuery {
    fn from(params: ListParams) -> Self {
        Self {
            offset: params.skip,
            limit: params.limit,
            status: params.status,
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({"error": message.into()}))).into_response()
}

fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Task not found")
}

fn store_failure(e: DatabaseError) -> Response {
    error!(error = %e, "Task store failure");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

fn lifecycle_failure(e: Error) -> Response {
    match e {
        Error::Validation(e) => error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
        Error::Database(e) => store_failure(e),
    }
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// POST /tasks
async fn create_task(
    State(state): State<TaskRouteState>,
    Json(input): Json<NewTask>,
) -> Response {
    match state.lifecycle.on_create(input).await {
        Ok(task) => (StatusCode::CREATED, Json(task)).into_response(),
        Err(e) => lifecycle_failure(e),
    }
}

/// GET /tasks?skip=0&limit=10&status=pending
async fn list_tasks(
    State(state): State<TaskRouteState>,
    Query(params): Query<ListParams>,
) -> Response {
    match state.lifecycle.on_list(params.into()).await {
        Ok(tasks) => Json(tasks).into_response(),
        Err(e) => store_failure(e),
    }
}

/// GET /tasks/{id}
async fn get_task(State(state): State<TaskRouteState>, Path(id): Path<i64>) -> Response {
    match state.lifecycle.on_get(id).await {
        Ok(Some(task)) => Json(task).into_response(),
        Ok(None) => not_found(),
        Err(e) => store_failure(e),
    }
}

/// PATCH /tasks/{id}
///
/// Keys missing from the body are left alone; an explicit `null` clears
/// a nullable field.
async fn update_task(
    State(state): State<TaskRouteState>,
    Path(id): Path<i64>,
    Json(patch): Json<TaskPatch>,
) -> Response {
    match state.lifecycle.on_update(id, patch).await {
        Ok(Some(task)) => Json(task).into_response(),
        Ok(None) => not_found(),
        Err(e) => lifecycle_failure(e),
    }
}

/// DELETE /tasks/{id}
async fn delete_task(State(state): State<TaskRouteState>, Path(id): Path<i64>) -> Response {
    match state.lifecycle.on_delete(id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => not_found(),
        Err(e) => store_failure(e),
    }
}

/// GET /tasks/{id}/history
///
/// History outlives the task, so this answers for deleted IDs too.
async fn task_history(State(state): State<TaskRouteState>, Path(id): Path<i64>) -> Response {
    match state.lifecycle.on_history(id).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => store_failure(e),
    }
}

/// Build the task REST routes.
pub fn task_routes(state: TaskRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/{id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route("/tasks/{id}/history", get(task_history))
        .with_state(state)
}

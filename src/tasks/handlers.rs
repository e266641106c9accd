use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{error, instrument};

use crate::{auth::extractors::AuthUser, state::AppState};

use super::dto::{CreateTaskRequest, TaskResponse, UpdateTaskRequest};
use super::repo::Task;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/:id",
            get(get_task).patch(update_task).delete(delete_task),
        )
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    error!(error = %e, "task query failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".into(),
    )
}

fn not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Task not found".into())
}

fn validate_title(title: &str) -> Result<(), (StatusCode, String)> {
    if title.is_empty() || title.len() > 255 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Title must be between 1 and 255 characters".into(),
        ));
    }
    Ok(())
}

#[instrument(skip(state))]
pub async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<TaskResponse>>, (StatusCode, String)> {
    let tasks = Task::list_by_user(&state.db, user_id)
        .await
        .map_err(internal)?;
    Ok(Json(tasks.into_iter().map(TaskResponse::from).collect()))
}

#[instrument(skip(state, payload))]
pub async fn create_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), (StatusCode, String)> {
    validate_title(&payload.title)?;

    let task = Task::create(
        &state.db,
        user_id,
        &payload.title,
        payload.completed.unwrap_or(false),
    )
    .await
    .map_err(internal)?;
    Ok((StatusCode::CREATED, Json(task.into())))
}

#[instrument(skip(state))]
pub async fn get_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<TaskResponse>, (StatusCode, String)> {
    let task = Task::find_one(&state.db, id, user_id)
        .await
        .map_err(internal)?
        .ok_or_else(not_found)?;
    Ok(Json(task.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, (StatusCode, String)> {
    if let Some(title) = &payload.title {
        validate_title(title)?;
    }

    let task = Task::update(
        &state.db,
        id,
        user_id,
        payload.title.as_deref(),
        payload.completed,
    )
    .await
    .map_err(internal)?
    .ok_or_else(not_found)?;
    Ok(Json(task.into()))
}

#[instrument(skip(state))]
pub async fn delete_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    let deleted = Task::delete(&state.db, id, user_id)
        .await
        .map_err(internal)?;
    if !deleted {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_length_bounds() {
        assert!(validate_title("").is_err());
        assert!(validate_title("Water the plants").is_ok());
        assert!(validate_title(&"x".repeat(256)).is_err());
    }
}

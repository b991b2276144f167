use axum::extract::{Path, Query, State};
use axum::{http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::db::{self, TaskFilter};
use crate::error::AppError;
use crate::middleware::Identity;
use crate::models::{parse_sort, CreateTask, Priority, TaskQuery, UpdateTask};
use crate::AppState;

pub async fn list_tasks(
    Identity(user): Identity,
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
) -> Result<Json<Value>, AppError> {
    let priority = match query.priority.as_deref() {
        Some(raw) => Some(Priority::parse(raw).ok_or_else(|| {
            AppError::Validation("priority must be baja, media or alta".into())
        })?),
        None => None,
    };
    let sort = match query.sort.as_deref() {
        Some(raw) => parse_sort(raw)?,
        None => Vec::new(),
    };

    let filter = TaskFilter {
        completed: query.completed,
        priority,
        sort,
    };
    let tasks = db::list_tasks(&state.db, user.id, &filter)?;
    debug!(user_id = user.id, count = tasks.len(), "listed tasks");

    Ok(Json(json!({
        "status": "success",
        "count": tasks.len(),
        "data": { "tasks": tasks },
    })))
}

pub async fn create_task(
    Identity(user): Identity,
    State(state): State<AppState>,
    Json(req): Json<CreateTask>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let req = req.cleaned();
    req.validate()?;

    let task = db::create_task(
        &state.db,
        user.id,
        &req.title,
        req.description.as_deref(),
        req.completed.unwrap_or(false),
        req.priority.unwrap_or_default(),
        req.due_date.as_deref(),
    )?;
    info!(user_id = user.id, task_id = task.id, "created task");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": "success", "data": { "task": task } })),
    ))
}

pub async fn get_task(
    Identity(user): Identity,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    match db::get_task(&state.db, id, user.id)? {
        Some(task) => Ok(Json(
            json!({ "status": "success", "data": { "task": task } }),
        )),
        None => Err(AppError::NotFound),
    }
}

pub async fn update_task(
    Identity(user): Identity,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTask>,
) -> Result<Json<Value>, AppError> {
    let req = req.cleaned();
    req.validate()?;

    match db::update_task(&state.db, id, user.id, &req)? {
        Some(task) => {
            info!(user_id = user.id, task_id = task.id, "updated task");
            Ok(Json(
                json!({ "status": "success", "data": { "task": task } }),
            ))
        }
        None => Err(AppError::NotFound),
    }
}

pub async fn delete_task(
    Identity(user): Identity,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    if db::delete_task(&state.db, id, user.id)? {
        info!(user_id = user.id, task_id = id, "deleted task");
        Ok(Json(json!({ "status": "success", "data": null })))
    } else {
        Err(AppError::NotFound)
    }
}

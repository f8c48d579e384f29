use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tasker_core::{NewTask, Task, TaskId, TaskUpdate, TaskerError};
use tasker_cron::CronExpression;
use tasker_scheduler::RunNowResult;
use tracing::info;

use super::{api_error, ApiError};
use crate::app::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OwnerQuery {
    pub owner: Option<String>,
}

/// Body of `PATCH /tasks/{id}`. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct EditTaskRequest {
    pub name: Option<String>,
    pub command: Option<String>,
    pub schedule: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRequest {
    pub is_active: bool,
}

/// GET /tasks[?owner=]
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = state
        .store
        .list_tasks(query.owner.as_deref())
        .map_err(api_error)?;
    Ok(Json(tasks))
}

/// POST /tasks
///
/// Rejects unparseable schedules up front; active tasks are armed
/// immediately and returned with their first `nextRun`.
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    if new.name.trim().is_empty() || new.command.trim().is_empty() {
        return Err(api_error(TaskerError::InvalidRequest(
            "name and command are required".into(),
        )));
    }
    CronExpression::parse(&new.schedule).map_err(|e| {
        api_error(TaskerError::InvalidSchedule {
            expression: new.schedule.clone(),
            reason: e.to_string(),
        })
    })?;

    let mut task = state.store.create_task(new).map_err(api_error)?;
    if task.is_active {
        let next_run = state.scheduler.schedule_task(&task);
        task = state
            .store
            .update_task(&task.id, TaskUpdate::next_run(next_run))
            .map_err(api_error)?;
    }
    info!(task_id = %task.id, owner = %task.owner_id, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /tasks/{id}
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let id = TaskId::from(id);
    state
        .store
        .get_task(&id)
        .map_err(api_error)?
        .map(Json)
        .ok_or_else(|| api_error(TaskerError::TaskNotFound { id: id.0 }))
}

/// PATCH /tasks/{id}: edit name, command or schedule.
///
/// A new schedule re-arms an active task's timer and persists the new
/// `nextRun`.
pub async fn edit_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<EditTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    let id = TaskId::from(id);
    let blank = |field: &Option<String>| field.as_deref().is_some_and(|v| v.trim().is_empty());
    if blank(&req.name) || blank(&req.command) {
        return Err(api_error(TaskerError::InvalidRequest(
            "name and command cannot be empty".into(),
        )));
    }
    if let Some(schedule) = &req.schedule {
        CronExpression::parse(schedule).map_err(|e| {
            api_error(TaskerError::InvalidSchedule {
                expression: schedule.clone(),
                reason: e.to_string(),
            })
        })?;
    }

    let reschedule = req.schedule.is_some();
    let update = TaskUpdate {
        name: req.name,
        command: req.command,
        schedule: req.schedule,
        ..TaskUpdate::default()
    };
    if update.is_empty() {
        return Err(api_error(TaskerError::InvalidRequest(
            "nothing to update".into(),
        )));
    }

    let mut task = state.store.update_task(&id, update).map_err(api_error)?;
    if reschedule && task.is_active {
        let next_run = state.scheduler.schedule_task(&task);
        task = state
            .store
            .update_task(&id, TaskUpdate::next_run(next_run))
            .map_err(api_error)?;
    }
    info!(task_id = %task.id, rescheduled = reschedule && task.is_active, "task edited");
    Ok(Json(task))
}

/// DELETE /tasks/{id}: disarms the timer, then removes the task and its
/// history.
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = TaskId::from(id);
    state.scheduler.cancel_task(&id);
    if !state.store.delete_task(&id).map_err(api_error)? {
        return Err(api_error(TaskerError::TaskNotFound { id: id.0 }));
    }
    info!(task_id = %id, "task deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /tasks/{id}/toggle `{ "isActive": bool }`
pub async fn toggle_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ToggleRequest>,
) -> Result<Json<Task>, ApiError> {
    let task = state
        .scheduler
        .toggle_task(&TaskId::from(id), req.is_active)
        .await
        .map_err(api_error)?;
    Ok(Json(task))
}

/// POST /tasks/{id}/run: run immediately and wait for the outcome.
pub async fn run_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RunNowResult>, ApiError> {
    let id = TaskId::from(id);
    if state.store.get_task(&id).map_err(api_error)?.is_none() {
        return Err(api_error(TaskerError::TaskNotFound { id: id.0 }));
    }
    Ok(Json(state.scheduler.execute_task_now(&id).await))
}

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tasker_core::{ExecutionId, TaskerError};
use tasker_store::{ExecutionFilter, ExecutionPage, ExecutionRecord};

use super::{api_error, ApiError};
use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    /// Comma-separated execution ids.
    #[serde(default)]
    pub ids: String,
    pub owner: Option<String>,
}

/// GET /executions?status=&taskId=&owner=&date=&page=&limit=
pub async fn list_executions(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ExecutionFilter>,
) -> Result<Json<ExecutionPage>, ApiError> {
    let page = state.store.list_executions(&filter).map_err(api_error)?;
    Ok(Json(page))
}

/// GET /executions/{id}
pub async fn get_execution(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ExecutionRecord>, ApiError> {
    let id = ExecutionId::from(id);
    state
        .store
        .get_execution(&id)
        .map_err(api_error)?
        .map(Json)
        .ok_or_else(|| api_error(TaskerError::ExecutionNotFound { id: id.0 }))
}

/// DELETE /executions?ids=a,b[&owner=]
///
/// All-or-nothing: any id that is missing or owned by another tenant
/// rejects the whole batch with 403.
pub async fn delete_executions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<Value>, ApiError> {
    let ids: Vec<ExecutionId> = query
        .ids
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ExecutionId::from)
        .collect();
    if ids.is_empty() {
        return Err(api_error(TaskerError::InvalidRequest(
            "ids must list at least one execution id".into(),
        )));
    }

    let deleted = state
        .store
        .delete_executions(&ids, query.owner.as_deref())
        .map_err(api_error)?;
    Ok(Json(json!({ "success": true, "deleted": deleted })))
}

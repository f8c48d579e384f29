use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use super::{api_error, ApiError};
use crate::app::AppState;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerAction {
    Start,
    Stop,
}

#[derive(Debug, Deserialize)]
pub struct ControlRequest {
    pub action: SchedulerAction,
}

/// GET /scheduler
pub async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "initialized": state.scheduler.is_initialized(),
        "scheduled": state.scheduler.scheduled_count(),
        "queue": state.scheduler.queue_stats(),
    }))
}

/// POST /scheduler `{ "action": "start" | "stop" }`
///
/// Starting an already running scheduler is reported, not repeated.
pub async fn control(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ControlRequest>,
) -> Result<Json<Value>, ApiError> {
    let scheduler = &state.scheduler;
    let message = match req.action {
        SchedulerAction::Start if scheduler.is_initialized() => {
            "scheduler already running".to_string()
        }
        SchedulerAction::Start => {
            let armed = scheduler.start().await.map_err(api_error)?;
            info!(armed, "scheduler started via API");
            format!("scheduler started, {armed} tasks armed")
        }
        SchedulerAction::Stop => {
            scheduler.stop().await;
            info!("scheduler stopped via API");
            "scheduler stopped".to_string()
        }
    };
    Ok(Json(json!({
        "success": true,
        "message": message,
        "initialized": scheduler.is_initialized(),
    })))
}

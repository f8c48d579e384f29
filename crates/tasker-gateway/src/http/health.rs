use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness check with scheduler and queue state.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSecs": state.started_at.elapsed().as_secs(),
        "scheduler": {
            "initialized": state.scheduler.is_initialized(),
            "scheduled": state.scheduler.scheduled_count(),
            "timezone": state.config.scheduler.timezone,
        },
        "queue": state.scheduler.queue_stats(),
    }))
}

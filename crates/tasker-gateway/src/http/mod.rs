pub mod cron;
pub mod executions;
pub mod health;
pub mod scheduler;
pub mod tasks;

use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tasker_core::TaskerError;
use tracing::warn;

/// Error half of every handler's return type.
pub type ApiError = (StatusCode, Json<Value>);

/// Map a domain error to `{ "error", "code" }` with a matching status.
pub fn api_error(e: impl Into<TaskerError>) -> ApiError {
    let e = e.into();
    let status = match e.code() {
        "TASK_NOT_FOUND" | "EXECUTION_NOT_FOUND" => StatusCode::NOT_FOUND,
        "FORBIDDEN" => StatusCode::FORBIDDEN,
        "INVALID_SCHEDULE" | "INVALID_REQUEST" => StatusCode::BAD_REQUEST,
        "TIMEOUT" => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(code = e.code(), error = %e, "request failed");
    }
    (status, Json(json!({ "error": e.to_string(), "code": e.code() })))
}

use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tasker_core::config::TaskerConfig;
use tasker_scheduler::Scheduler;
use tasker_store::TaskStore;

use crate::http;

/// Central shared state, passed as `Arc<AppState>` to all handlers.
pub struct AppState {
    pub config: TaskerConfig,
    pub store: Arc<TaskStore>,
    pub scheduler: Scheduler,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: TaskerConfig, store: Arc<TaskStore>, scheduler: Scheduler) -> Self {
        Self {
            config,
            store,
            scheduler,
            started_at: Instant::now(),
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(http::health::health_handler))
        .route(
            "/tasks",
            get(http::tasks::list_tasks).post(http::tasks::create_task),
        )
        .route(
            "/tasks/{id}",
            get(http::tasks::get_task)
                .patch(http::tasks::edit_task)
                .delete(http::tasks::delete_task),
        )
        .route("/tasks/{id}/toggle", post(http::tasks::toggle_task))
        .route("/tasks/{id}/run", post(http::tasks::run_task))
        .route(
            "/scheduler",
            get(http::scheduler::status).post(http::scheduler::control),
        )
        .route(
            "/executions",
            get(http::executions::list_executions).delete(http::executions::delete_executions),
        )
        .route("/executions/{id}", get(http::executions::get_execution))
        .route("/cron/describe", get(http::cron::describe))
        .with_state(state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

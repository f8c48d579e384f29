use axum::extract::Query;
use axum::Json;
use serde::Deserialize;
use tasker_cron::CronDescription;

#[derive(Debug, Deserialize)]
pub struct DescribeQuery {
    #[serde(default)]
    pub expression: String,
}

/// GET /cron/describe?expression=...
///
/// Total: malformed input yields `isValid: false`, never an error status.
pub async fn describe(Query(query): Query<DescribeQuery>) -> Json<CronDescription> {
    Json(tasker_cron::describe(&query.expression))
}

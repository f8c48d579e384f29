use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tasker_core::{ExecutionStatus, TaskExecution, TaskId};

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Narrowing for [`crate::TaskStore::list_executions`]. Every field is
/// optional; pagination defaults to page 1 of 10.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFilter {
    pub status: Option<ExecutionStatus>,
    pub task_id: Option<TaskId>,
    /// Only executions of tasks owned by this tenant.
    #[serde(alias = "owner")]
    pub owner_id: Option<String>,
    /// Calendar day (UTC) the run started on.
    pub date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ExecutionFilter {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_LIMIT)
    }
}

/// One history row plus the name of the task that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    #[serde(flatten)]
    pub execution: TaskExecution,
    pub task_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl Pagination {
    pub fn new(total: u64, page: u32, limit: u32) -> Self {
        let total_pages = total.div_ceil(u64::from(limit.max(1)));
        Self {
            total,
            page,
            limit,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
        }
    }

    /// Rows to skip to reach `page`.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// A page of execution history, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPage {
    pub data: Vec<ExecutionRecord>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(Pagination::new(0, 1, 10).total_pages, 0);
        assert_eq!(Pagination::new(10, 1, 10).total_pages, 1);
        assert_eq!(Pagination::new(11, 1, 10).total_pages, 2);
        assert_eq!(Pagination::new(11, 3, 5).offset(), 10);
    }

    #[test]
    fn filter_reads_query_style_keys() {
        let filter: ExecutionFilter = serde_json::from_str(
            r#"{"status":"ERROR","taskId":"t1","owner":"u1","date":"2026-03-01","page":2}"#,
        )
        .unwrap();
        assert_eq!(filter.status, Some(ExecutionStatus::Error));
        assert_eq!(filter.task_id, Some(TaskId::from("t1")));
        assert_eq!(filter.owner_id.as_deref(), Some("u1"));
        assert_eq!(filter.date, NaiveDate::from_ymd_opt(2026, 3, 1));
        assert_eq!(filter.page(), 2);
        assert_eq!(filter.limit(), DEFAULT_PAGE_LIMIT);
    }
}

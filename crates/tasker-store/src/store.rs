use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tasker_core::{
    ExecutionId, NewExecution, NewTask, Task, TaskExecution, TaskId, TaskRepository, TaskStatus,
    TaskUpdate,
};
use tracing::{debug, info, instrument};

use crate::db::init_db;
use crate::error::{Result, StoreError};
use crate::types::{ExecutionFilter, ExecutionPage, ExecutionRecord, Pagination, MAX_PAGE_LIMIT};

const TASK_COLUMNS: &str = "id, owner_id, name, command, schedule, is_active,
                            last_run, last_status, next_run, created_at, updated_at";

const EXECUTION_COLUMNS: &str = "e.id, e.task_id, e.start_time, e.end_time, e.duration_ms,
                                 e.status, e.output, e.error, t.name";

/// SQLite-backed task and execution-history store.
///
/// Wraps a single connection in a `Mutex`; every call is a short statement
/// or a single transaction.
pub struct TaskStore {
    db: Mutex<Connection>,
}

impl TaskStore {
    /// Wrap an open connection, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Open (or create) the database file with WAL journaling and foreign
    /// keys enforced.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::new(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::new(conn)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ----- tasks -----------------------------------------------------------

    #[instrument(skip(self, new), fields(owner_id = %new.owner_id, name = %new.name))]
    pub fn create_task(&self, new: NewTask) -> Result<Task> {
        let now = Utc::now();
        let task = Task {
            id: TaskId::new(),
            owner_id: new.owner_id,
            name: new.name,
            command: new.command,
            schedule: new.schedule,
            is_active: new.is_active,
            last_run: None,
            last_status: None,
            next_run: None,
            created_at: now,
            updated_at: now,
        };
        self.conn().execute(
            "INSERT INTO tasks
             (id, owner_id, name, command, schedule, is_active,
              last_run, last_status, next_run, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, NULL, NULL, ?7, ?7)",
            params![
                task.id.as_str(),
                task.owner_id,
                task.name,
                task.command,
                task.schedule,
                task.is_active,
                ts(&now)
            ],
        )?;
        info!(task_id = %task.id, "task created");
        Ok(task)
    }

    #[instrument(skip(self), fields(task_id = %id))]
    pub fn get_task(&self, id: &TaskId) -> Result<Option<Task>> {
        let task = self
            .conn()
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id.as_str()],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    /// Tasks newest first, optionally for one owner only.
    #[instrument(skip(self))]
    pub fn list_tasks(&self, owner: Option<&str>) -> Result<Vec<Task>> {
        let db = self.conn();
        let mut stmt = db.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE (?1 IS NULL OR owner_id = ?1)
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![owner], row_to_task)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    #[instrument(skip(self))]
    pub fn list_active_tasks(&self) -> Result<Vec<Task>> {
        let db = self.conn();
        let mut stmt = db.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE is_active = 1 ORDER BY created_at"
        ))?;
        let rows = stmt.query_map([], row_to_task)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Apply the non-`None` fields of `fields` and return the updated row.
    #[instrument(skip(self, fields), fields(task_id = %id))]
    pub fn update_task(&self, id: &TaskId, fields: TaskUpdate) -> Result<Task> {
        let mut sets: Vec<&str> = vec!["updated_at = ?"];
        let mut values: Vec<Value> = vec![Value::Text(ts(&Utc::now()))];

        if let Some(name) = fields.name {
            sets.push("name = ?");
            values.push(Value::Text(name));
        }
        if let Some(command) = fields.command {
            sets.push("command = ?");
            values.push(Value::Text(command));
        }
        if let Some(schedule) = fields.schedule {
            sets.push("schedule = ?");
            values.push(Value::Text(schedule));
        }
        if let Some(active) = fields.is_active {
            sets.push("is_active = ?");
            values.push(Value::Integer(i64::from(active)));
        }
        if let Some(last_run) = fields.last_run {
            sets.push("last_run = ?");
            values.push(Value::Text(ts(&last_run)));
        }
        if let Some(status) = fields.last_status {
            sets.push("last_status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(next_run) = fields.next_run {
            sets.push("next_run = ?");
            values.push(next_run.map_or(Value::Null, |t| Value::Text(ts(&t))));
        }
        values.push(Value::Text(id.0.clone()));

        let db = self.conn();
        let changed = db.execute(
            &format!("UPDATE tasks SET {} WHERE id = ?", sets.join(", ")),
            params_from_iter(values),
        )?;
        if changed == 0 {
            return Err(StoreError::TaskNotFound { id: id.0.clone() });
        }
        let task = db.query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            params![id.as_str()],
            row_to_task,
        )?;
        debug!("task updated");
        Ok(task)
    }

    /// Delete a task and its history. Returns `false` if it did not exist.
    #[instrument(skip(self), fields(task_id = %id))]
    pub fn delete_task(&self, id: &TaskId) -> Result<bool> {
        let mut db = self.conn();
        let tx = db.transaction()?;
        tx.execute(
            "DELETE FROM task_executions WHERE task_id = ?1",
            params![id.as_str()],
        )?;
        let removed = tx.execute("DELETE FROM tasks WHERE id = ?1", params![id.as_str()])?;
        tx.commit()?;
        if removed > 0 {
            info!("task deleted");
        }
        Ok(removed > 0)
    }

    // ----- executions ------------------------------------------------------

    #[instrument(skip(self, record), fields(task_id = %record.task_id, status = %record.status))]
    pub fn insert_execution(&self, record: NewExecution) -> Result<ExecutionId> {
        let id = ExecutionId::new();
        let inserted = self.conn().execute(
            "INSERT INTO task_executions
             (id, task_id, start_time, end_time, duration_ms, status, output, error)
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8
             WHERE EXISTS (SELECT 1 FROM tasks WHERE id = ?2)",
            params![
                id.as_str(),
                record.task_id.as_str(),
                ts(&record.start_time),
                ts(&record.end_time),
                record.duration_ms(),
                record.status.as_str(),
                record.output,
                record.error
            ],
        )?;
        if inserted == 0 {
            return Err(StoreError::TaskNotFound {
                id: record.task_id.0,
            });
        }
        debug!(execution_id = %id, "execution recorded");
        Ok(id)
    }

    #[instrument(skip(self), fields(execution_id = %id))]
    pub fn get_execution(&self, id: &ExecutionId) -> Result<Option<ExecutionRecord>> {
        let record = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {EXECUTION_COLUMNS}
                     FROM task_executions e JOIN tasks t ON t.id = e.task_id
                     WHERE e.id = ?1"
                ),
                params![id.as_str()],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Filtered, paginated history, newest first.
    #[instrument(skip(self))]
    pub fn list_executions(&self, filter: &ExecutionFilter) -> Result<ExecutionPage> {
        let page = filter.page();
        let limit = filter.limit();
        if page == 0 {
            return Err(StoreError::InvalidFilter("page must be at least 1".into()));
        }
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(StoreError::InvalidFilter(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }

        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(status) = filter.status {
            clauses.push("e.status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(task_id) = &filter.task_id {
            clauses.push("e.task_id = ?");
            values.push(Value::Text(task_id.0.clone()));
        }
        if let Some(owner) = &filter.owner_id {
            clauses.push("t.owner_id = ?");
            values.push(Value::Text(owner.clone()));
        }
        if let Some(date) = filter.date {
            let start = date.and_hms_opt(0, 0, 0).map(|d| d.and_utc());
            let Some(start) = start else {
                return Err(StoreError::InvalidFilter(format!("bad date {date}")));
            };
            clauses.push("e.start_time >= ? AND e.start_time < ?");
            values.push(Value::Text(ts(&start)));
            values.push(Value::Text(ts(&(start + Duration::days(1)))));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let db = self.conn();
        let total: i64 = db.query_row(
            &format!(
                "SELECT COUNT(*) FROM task_executions e JOIN tasks t ON t.id = e.task_id
                 {where_sql}"
            ),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        let pagination = Pagination::new(total.max(0) as u64, page, limit);

        let mut paged = values;
        paged.push(Value::Integer(i64::from(limit)));
        paged.push(Value::Integer(pagination.offset() as i64));
        let mut stmt = db.prepare(&format!(
            "SELECT {EXECUTION_COLUMNS}
             FROM task_executions e JOIN tasks t ON t.id = e.task_id
             {where_sql}
             ORDER BY e.start_time DESC, e.id DESC
             LIMIT ? OFFSET ?"
        ))?;
        let data = stmt
            .query_map(params_from_iter(paged), row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(ExecutionPage { data, pagination })
    }

    /// Delete every listed execution, or none of them.
    ///
    /// With `owner` set, each id must belong to a task of that owner. Any id
    /// that is missing or foreign aborts the whole delete.
    #[instrument(skip(self, ids), fields(requested = ids.len()))]
    pub fn delete_executions(&self, ids: &[ExecutionId], owner: Option<&str>) -> Result<usize> {
        if ids.is_empty() {
            return Err(StoreError::InvalidFilter("no execution ids given".into()));
        }
        let mut unique: Vec<&str> = ids.iter().map(ExecutionId::as_str).collect();
        unique.sort_unstable();
        unique.dedup();

        let placeholders = vec!["?"; unique.len()].join(", ");
        let mut values: Vec<Value> = unique.iter().map(|id| Value::Text(id.to_string())).collect();

        let mut db = self.conn();
        let tx = db.transaction()?;
        let matched: i64 = {
            let mut check = values.clone();
            check.push(owner.map_or(Value::Null, |o| Value::Text(o.to_string())));
            tx.query_row(
                &format!(
                    "SELECT COUNT(*) FROM task_executions e JOIN tasks t ON t.id = e.task_id
                     WHERE e.id IN ({placeholders})
                       AND (?{n} IS NULL OR t.owner_id = ?{n})",
                    n = unique.len() + 1
                ),
                params_from_iter(check),
                |row| row.get(0),
            )?
        };
        if matched as usize != unique.len() {
            return Err(StoreError::OwnershipMismatch {
                requested: unique.len(),
                matched: matched.max(0) as usize,
            });
        }

        let removed = tx.execute(
            &format!("DELETE FROM task_executions WHERE id IN ({placeholders})"),
            params_from_iter(values.drain(..)),
        )?;
        tx.commit()?;
        info!(removed, "executions deleted");
        Ok(removed)
    }
}

#[async_trait]
impl TaskRepository for TaskStore {
    async fn find_active_tasks(&self) -> tasker_core::Result<Vec<Task>> {
        Ok(self.list_active_tasks()?)
    }

    async fn find_by_id(&self, id: &TaskId) -> tasker_core::Result<Option<Task>> {
        Ok(self.get_task(id)?)
    }

    async fn update(&self, id: &TaskId, fields: TaskUpdate) -> tasker_core::Result<Task> {
        Ok(self.update_task(id, fields)?)
    }

    async fn create_execution(&self, record: NewExecution) -> tasker_core::Result<ExecutionId> {
        Ok(self.insert_execution(record)?)
    }
}

/// Canonical timestamp text: UTC, millisecond precision, `Z` suffix.
fn ts(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_opt_ts(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_ts(idx, &s)).transpose()
}

fn parse_text<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

/// Map a SQLite row (selected with `TASK_COLUMNS`) to a `Task`.
fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let last_status = row
        .get::<_, Option<String>>(7)?
        .map(|s| parse_text::<TaskStatus>(7, &s))
        .transpose()?;
    Ok(Task {
        id: TaskId(row.get(0)?),
        owner_id: row.get(1)?,
        name: row.get(2)?,
        command: row.get(3)?,
        schedule: row.get(4)?,
        is_active: row.get(5)?,
        last_run: parse_opt_ts(6, row.get(6)?)?,
        last_status,
        next_run: parse_opt_ts(8, row.get(8)?)?,
        created_at: parse_ts(9, &row.get::<_, String>(9)?)?,
        updated_at: parse_ts(10, &row.get::<_, String>(10)?)?,
    })
}

/// Map a SQLite row (selected with `EXECUTION_COLUMNS`) to an `ExecutionRecord`.
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExecutionRecord> {
    Ok(ExecutionRecord {
        execution: TaskExecution {
            id: ExecutionId(row.get(0)?),
            task_id: TaskId(row.get(1)?),
            start_time: parse_ts(2, &row.get::<_, String>(2)?)?,
            end_time: parse_ts(3, &row.get::<_, String>(3)?)?,
            duration_ms: row.get(4)?,
            status: parse_text(5, &row.get::<_, String>(5)?)?,
            output: row.get(6)?,
            error: row.get(7)?,
        },
        task_name: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use tasker_core::ExecutionStatus;

    use super::*;

    fn store() -> TaskStore {
        TaskStore::open_in_memory().unwrap()
    }

    fn new_task(owner: &str, name: &str) -> NewTask {
        NewTask {
            name: name.into(),
            command: "echo hi".into(),
            schedule: "* * * * *".into(),
            is_active: true,
            owner_id: owner.into(),
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn run(task: &TaskId, start: &str, status: ExecutionStatus) -> NewExecution {
        let start = at(start);
        NewExecution {
            task_id: task.clone(),
            start_time: start,
            end_time: start + Duration::milliseconds(250),
            status,
            output: "out".into(),
            error: (status != ExecutionStatus::Success).then(|| "boom".to_string()),
        }
    }

    #[test]
    fn create_get_list() {
        let s = store();
        let a = s.create_task(new_task("u1", "a")).unwrap();
        let b = s.create_task(new_task("u2", "b")).unwrap();

        let fetched = s.get_task(&a.id).unwrap().unwrap();
        assert_eq!(fetched.name, "a");
        assert!(fetched.is_active);
        assert!(fetched.next_run.is_none());

        assert_eq!(s.list_tasks(None).unwrap().len(), 2);
        let mine = s.list_tasks(Some("u2")).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, b.id);
        assert!(s.get_task(&TaskId::from("nope")).unwrap().is_none());
    }

    #[test]
    fn update_sets_and_clears_fields() {
        let s = store();
        let task = s.create_task(new_task("u1", "a")).unwrap();
        let when = at("2026-03-01T10:00:00Z");

        let updated = s
            .update_task(
                &task.id,
                TaskUpdate {
                    last_run: Some(when),
                    last_status: Some(TaskStatus::Error),
                    next_run: Some(Some(when + Duration::minutes(1))),
                    ..TaskUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.last_run, Some(when));
        assert_eq!(updated.last_status, Some(TaskStatus::Error));
        assert_eq!(updated.next_run, Some(when + Duration::minutes(1)));
        assert!(updated.is_active);

        let cleared = s
            .update_task(
                &task.id,
                TaskUpdate {
                    is_active: Some(false),
                    next_run: Some(None),
                    ..TaskUpdate::default()
                },
            )
            .unwrap();
        assert!(!cleared.is_active);
        assert!(cleared.next_run.is_none());
        assert_eq!(cleared.last_run, Some(when));
    }

    #[test]
    fn edit_changes_definition_and_keeps_run_state() {
        let s = store();
        let task = s.create_task(new_task("u1", "a")).unwrap();
        let when = at("2026-03-01T10:05:00Z");
        s.update_task(&task.id, TaskUpdate::next_run(Some(when))).unwrap();

        let edited = s
            .update_task(
                &task.id,
                TaskUpdate {
                    name: Some("renamed".into()),
                    command: Some("echo edited".into()),
                    schedule: Some("*/10 * * * *".into()),
                    ..TaskUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(edited.name, "renamed");
        assert_eq!(edited.command, "echo edited");
        assert_eq!(edited.schedule, "*/10 * * * *");
        assert_eq!(edited.owner_id, "u1");
        assert!(edited.is_active);
        assert_eq!(edited.next_run, Some(when));
        assert_eq!(s.get_task(&task.id).unwrap().unwrap(), edited);
    }

    #[test]
    fn update_missing_task_is_not_found() {
        let s = store();
        let err = s
            .update_task(&TaskId::from("ghost"), TaskUpdate::active(true))
            .unwrap_err();
        assert!(matches!(err, StoreError::TaskNotFound { .. }));
    }

    #[test]
    fn active_listing_skips_disabled() {
        let s = store();
        let on = s.create_task(new_task("u1", "on")).unwrap();
        s.create_task(NewTask {
            is_active: false,
            ..new_task("u1", "off")
        })
        .unwrap();
        let active = s.list_active_tasks().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, on.id);
    }

    #[test]
    fn execution_for_deleted_task_is_rejected() {
        let s = store();
        let err = s
            .insert_execution(run(&TaskId::from("ghost"), "2026-03-01T10:00:00Z", ExecutionStatus::Success))
            .unwrap_err();
        assert!(matches!(err, StoreError::TaskNotFound { .. }));
    }

    #[test]
    fn delete_task_removes_history() {
        let s = store();
        let task = s.create_task(new_task("u1", "a")).unwrap();
        let exec = s
            .insert_execution(run(&task.id, "2026-03-01T10:00:00Z", ExecutionStatus::Success))
            .unwrap();
        assert!(s.delete_task(&task.id).unwrap());
        assert!(!s.delete_task(&task.id).unwrap());
        assert!(s.get_execution(&exec).unwrap().is_none());
    }

    #[test]
    fn list_executions_filters_and_paginates() {
        let s = store();
        let a = s.create_task(new_task("u1", "alpha")).unwrap();
        let b = s.create_task(new_task("u2", "beta")).unwrap();
        for minute in 0..15 {
            let status = if minute % 5 == 0 {
                ExecutionStatus::Error
            } else {
                ExecutionStatus::Success
            };
            s.insert_execution(run(&a.id, &format!("2026-03-01T10:{minute:02}:00Z"), status))
                .unwrap();
        }
        s.insert_execution(run(&b.id, "2026-03-02T00:00:00Z", ExecutionStatus::Timeout))
            .unwrap();

        let first = s.list_executions(&ExecutionFilter::default()).unwrap();
        assert_eq!(first.pagination.total, 16);
        assert_eq!(first.pagination.total_pages, 2);
        assert_eq!(first.data.len(), 10);
        assert_eq!(first.data[0].task_name, "beta");
        assert_eq!(first.data[1].execution.start_time, at("2026-03-01T10:14:00Z"));

        let second = s
            .list_executions(&ExecutionFilter {
                page: Some(2),
                ..ExecutionFilter::default()
            })
            .unwrap();
        assert_eq!(second.data.len(), 6);

        let errors = s
            .list_executions(&ExecutionFilter {
                status: Some(ExecutionStatus::Error),
                ..ExecutionFilter::default()
            })
            .unwrap();
        assert_eq!(errors.pagination.total, 3);

        let by_day = s
            .list_executions(&ExecutionFilter {
                date: chrono::NaiveDate::from_ymd_opt(2026, 3, 2),
                ..ExecutionFilter::default()
            })
            .unwrap();
        assert_eq!(by_day.pagination.total, 1);
        assert_eq!(by_day.data[0].execution.status, ExecutionStatus::Timeout);

        let by_owner = s
            .list_executions(&ExecutionFilter {
                owner_id: Some("u1".into()),
                limit: Some(100),
                ..ExecutionFilter::default()
            })
            .unwrap();
        assert_eq!(by_owner.data.len(), 15);
        assert!(by_owner.data.iter().all(|r| r.execution.task_id == a.id));
    }

    #[test]
    fn list_executions_rejects_bad_pagination() {
        let s = store();
        for filter in [
            ExecutionFilter {
                limit: Some(101),
                ..ExecutionFilter::default()
            },
            ExecutionFilter {
                limit: Some(0),
                ..ExecutionFilter::default()
            },
            ExecutionFilter {
                page: Some(0),
                ..ExecutionFilter::default()
            },
        ] {
            assert!(matches!(
                s.list_executions(&filter),
                Err(StoreError::InvalidFilter(_))
            ));
        }
    }

    #[test]
    fn bulk_delete_is_all_or_nothing() {
        let s = store();
        let mine = s.create_task(new_task("u1", "mine")).unwrap();
        let theirs = s.create_task(new_task("u2", "theirs")).unwrap();
        let e1 = s
            .insert_execution(run(&mine.id, "2026-03-01T10:00:00Z", ExecutionStatus::Success))
            .unwrap();
        let e2 = s
            .insert_execution(run(&mine.id, "2026-03-01T10:01:00Z", ExecutionStatus::Success))
            .unwrap();
        let foreign = s
            .insert_execution(run(&theirs.id, "2026-03-01T10:02:00Z", ExecutionStatus::Success))
            .unwrap();

        let err = s
            .delete_executions(&[e1.clone(), foreign.clone()], Some("u1"))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::OwnershipMismatch {
                requested: 2,
                matched: 1
            }
        ));
        assert!(s.get_execution(&e1).unwrap().is_some());

        let err = s
            .delete_executions(&[e1.clone(), ExecutionId::from("missing")], None)
            .unwrap_err();
        assert!(matches!(err, StoreError::OwnershipMismatch { .. }));

        assert_eq!(s.delete_executions(&[e1.clone(), e2.clone()], Some("u1")).unwrap(), 2);
        assert!(s.get_execution(&e1).unwrap().is_none());
        assert!(s.get_execution(&foreign).unwrap().is_some());
    }

    #[tokio::test]
    async fn repository_trait_maps_errors() {
        let s = store();
        let task = s.create_task(new_task("u1", "a")).unwrap();
        let repo: &dyn TaskRepository = &s;

        assert_eq!(repo.find_active_tasks().await.unwrap().len(), 1);
        assert!(repo.find_by_id(&task.id).await.unwrap().is_some());
        let err = repo
            .update(&TaskId::from("ghost"), TaskUpdate::active(false))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TASK_NOT_FOUND");

        let id = repo
            .create_execution(run(&task.id, "2026-03-01T10:00:00Z", ExecutionStatus::Error))
            .await
            .unwrap();
        let stored = s.get_execution(&id).unwrap().unwrap();
        assert_eq!(stored.execution.duration_ms, 250);
        assert_eq!(stored.execution.error.as_deref(), Some("boom"));
    }
}

use rusqlite::Connection;

use crate::error::Result;

/// Initialise the `tasks` and `task_executions` tables and their indexes.
///
/// Safe to call on every startup; uses `IF NOT EXISTS` throughout.
/// Timestamps are RFC 3339 text in UTC with millisecond precision, so string
/// order is chronological order.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS tasks (
            id          TEXT PRIMARY KEY,
            owner_id    TEXT NOT NULL,
            name        TEXT NOT NULL,
            command     TEXT NOT NULL,
            schedule    TEXT NOT NULL,
            is_active   INTEGER NOT NULL DEFAULT 1,
            last_run    TEXT,
            last_status TEXT,               -- 'success' | 'error'
            next_run    TEXT,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_active ON tasks(is_active);
        CREATE INDEX IF NOT EXISTS idx_tasks_owner
            ON tasks(owner_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS task_executions (
            id          TEXT PRIMARY KEY,
            task_id     TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            start_time  TEXT NOT NULL,
            end_time    TEXT NOT NULL,
            duration_ms INTEGER NOT NULL,
            status      TEXT NOT NULL,      -- 'SUCCESS' | 'ERROR' | 'TIMEOUT'
            output      TEXT NOT NULL DEFAULT '',
            error       TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_executions_task
            ON task_executions(task_id, start_time DESC);
        CREATE INDEX IF NOT EXISTS idx_executions_start
            ON task_executions(start_time DESC);",
    )?;
    Ok(())
}

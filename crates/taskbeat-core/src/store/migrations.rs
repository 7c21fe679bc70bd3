use super::TaskStore;
use crate::error::{Result, SchedulerError};

impl TaskStore {
    /// Run database migrations
    pub(super) async fn migrate(&self) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SchedulerError::Transaction(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                task_type TEXT NOT NULL DEFAULT 'default',
                cron_expression TEXT NOT NULL,
                dependency_id TEXT,
                status TEXT NOT NULL DEFAULT 'Pending',
                enabled BOOLEAN NOT NULL DEFAULT TRUE,
                retry_count INTEGER NOT NULL DEFAULT 0,
                max_retries INTEGER NOT NULL DEFAULT 3,
                last_run_time TIMESTAMP,
                next_run_time TIMESTAMP,
                created_at TIMESTAMP NOT NULL,
                FOREIGN KEY (dependency_id) REFERENCES tasks(id) ON DELETE SET NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| SchedulerError::Transaction(format!("migration failed (tasks): {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS execution_records (
                id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL,
                started_at TIMESTAMP NOT NULL,
                finished_at TIMESTAMP NOT NULL,
                duration_secs REAL NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                message TEXT NOT NULL DEFAULT '',
                FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            SchedulerError::Transaction(format!("migration failed (execution_records): {}", e))
        })?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_enabled ON tasks(enabled)")
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                SchedulerError::Transaction(format!("migration failed (idx_tasks_enabled): {}", e))
            })?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_next_run ON tasks(next_run_time)")
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                SchedulerError::Transaction(format!("migration failed (idx_tasks_next_run): {}", e))
            })?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_records_task_finished \
             ON execution_records(task_id, finished_at)",
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            SchedulerError::Transaction(format!(
                "migration failed (idx_records_task_finished): {}",
                e
            ))
        })?;

        tx.commit()
            .await
            .map_err(|e| SchedulerError::Transaction(e.to_string()))?;

        Ok(())
    }
}

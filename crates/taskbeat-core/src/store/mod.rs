//! Task and execution-record storage using SQLite
//!
//! Persists scheduler state for durability across restarts. The store is
//! the single writer boundary: task-field updates go through full-row
//! saves, execution records are append-only, and the Running transition
//! is a compare-and-set so concurrent callers cannot double-execute a
//! task.

mod migrations;
mod queries;


use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;

use crate::error::{Result, SchedulerError};

/// SQLite-backed task store
pub struct TaskStore {
    pub(crate) pool: Pool<Sqlite>,
}

impl TaskStore {
    /// Open a store at the given database path, creating it if missing
    pub async fn from_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SchedulerError::InvalidConfig(format!("failed to create directory: {}", e))
            })?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }
}

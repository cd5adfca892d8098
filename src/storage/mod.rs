use anyhow::{anyhow, Result};
use chrono::Utc;
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};
use uuid::Uuid;

/// Default timeout for individual SQLite queries.
/// Prevents hung queries from blocking the daemon indefinitely.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Execute a future with the standard query timeout.
/// Returns an error if the operation takes longer than `QUERY_TIMEOUT`.
async fn with_timeout<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!(
            "database query timed out after {}s",
            QUERY_TIMEOUT.as_secs()
        )),
    }
}

// ─── Row types ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    /// User id of the assignee. NULL = unassigned.
    pub assigned_user: Option<String>,
    /// Optimistic-concurrency token: starts at 1, +1 on every successful write.
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct ActivityRow {
    pub id: String,
    pub username: String,
    pub action: String,
    pub created_at: String,
}

// ─── Storage ──────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join("boardd.db");
        let opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .create_if_missing(true);

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        // Idempotent DDL — the schema is small enough that a single
        // CREATE-IF-NOT-EXISTS pass replaces a migration directory.
        let stmts = [
            "CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL UNIQUE,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'Todo',
                priority TEXT NOT NULL DEFAULT 'Medium',
                assigned_user TEXT,
                version INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS activity_log (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                action TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_tasks_assigned ON tasks (assigned_user, status)",
        ];
        for stmt in stmts {
            sqlx::query(stmt).execute(pool).await?;
        }
        Ok(())
    }

    // ─── Tasks ────────────────────────────────────────────────────────────────

    pub async fn create_task(
        &self,
        title: &str,
        description: Option<&str>,
        status: &str,
        priority: &str,
        assigned_user: Option<&str>,
    ) -> Result<TaskRow> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO tasks (id, title, description, status, priority, assigned_user, version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(&id)
        .bind(title)
        .bind(description)
        .bind(status)
        .bind(priority)
        .bind(assigned_user)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        self.get_task(&id)
            .await?
            .ok_or_else(|| anyhow!("task not found after insert"))
    }

    pub async fn get_task(&self, id: &str) -> Result<Option<TaskRow>> {
        Ok(sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn find_task_by_title(&self, title: &str) -> Result<Option<TaskRow>> {
        Ok(sqlx::query_as("SELECT * FROM tasks WHERE title = ?")
            .bind(title)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn list_tasks(&self) -> Result<Vec<TaskRow>> {
        let pool = self.pool.clone();
        with_timeout(async {
            Ok(
                sqlx::query_as("SELECT * FROM tasks ORDER BY created_at, rowid")
                    .fetch_all(&pool)
                    .await?,
            )
        })
        .await
    }

    /// Write back every mutable field of a task.  The caller (the board
    /// engine) has already advanced `version`; this is the single write
    /// half of the read-check-write cycle.
    pub async fn update_task(&self, task: &TaskRow) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE tasks
             SET title = ?, description = ?, status = ?, priority = ?,
                 assigned_user = ?, version = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.status)
        .bind(&task.priority)
        .bind(&task.assigned_user)
        .bind(task.version)
        .bind(&now)
        .bind(&task.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Returns true if a row was deleted.
    pub async fn delete_task(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count of tasks assigned to `user_id` that are not Done.
    pub async fn count_open_tasks(&self, user_id: &str) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM tasks WHERE assigned_user = ? AND status != 'Done'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // ─── Users ────────────────────────────────────────────────────────────────

    /// Seam for the external identity layer — the daemon itself only reads
    /// user records.
    pub async fn create_user(&self, username: &str, email: &str) -> Result<UserRow> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO users (id, username, email, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(username)
            .bind(email)
            .bind(&now)
            .execute(&self.pool)
            .await?;
        self.get_user(&id)
            .await?
            .ok_or_else(|| anyhow!("user not found after insert"))
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// All users, earliest-created first.  This ordering is the documented
    /// smart-assign tie-break.
    pub async fn list_users(&self) -> Result<Vec<UserRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM users ORDER BY created_at, rowid")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    // ─── Activity ledger ──────────────────────────────────────────────────────

    pub async fn append_activity(&self, username: &str, action: &str) -> Result<ActivityRow> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO activity_log (id, username, action, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(username)
            .bind(action)
            .bind(&now)
            .execute(&self.pool)
            .await?;
        let row: ActivityRow = sqlx::query_as("SELECT * FROM activity_log WHERE id = ?")
            .bind(&id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    /// Delete everything except the `retain` most recent entries
    /// (insertion order).  Returns the number of rows removed.
    pub async fn trim_activity(&self, retain: i64) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM activity_log WHERE id NOT IN
             (SELECT id FROM activity_log ORDER BY rowid DESC LIMIT ?)",
        )
        .bind(retain)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_activity(&self, limit: i64) -> Result<Vec<ActivityRow>> {
        let pool = self.pool.clone();
        with_timeout(async {
            Ok(
                sqlx::query_as("SELECT * FROM activity_log ORDER BY rowid DESC LIMIT ?")
                    .bind(limit)
                    .fetch_all(&pool)
                    .await?,
            )
        })
        .await
    }

    pub async fn count_activity(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM activity_log")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

//! The board aggregate: task mutation engine, conflict detection, and the
//! side-effect pipeline (persist → ledger → broadcast) every mutation runs.

pub mod balancer;
pub mod ledger;
pub mod merge;

use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::storage::{Storage, TaskRow, UserRow};
use ledger::ActivityLedger;

/// Task titles may never collide with the column names.
pub const RESERVED_TITLES: [&str; 3] = ["Todo", "In Progress", "Done"];

// ─── Event kinds ──────────────────────────────────────────────────────────────

pub const EVENT_TASK_CREATED: &str = "taskCreated";
pub const EVENT_TASK_UPDATED: &str = "taskUpdated";
pub const EVENT_TASK_DELETED: &str = "taskDeleted";
pub const EVENT_ACTIVITY: &str = "activity";

/// Fan-out seam the engine publishes through.  Production is the WebSocket
/// broadcast channel; tests record events for assertion.  Publishing is
/// fire-and-forget — it must never block or fail a mutation.
pub trait Broadcaster: Send + Sync {
    fn publish(&self, event: &str, payload: Value);
}

// ─── Enums ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Todo,
    #[serde(rename = "In Progress")]
    InProgress,
    Done,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Todo => "Todo",
            Status::InProgress => "In Progress",
            Status::Done => "Done",
        }
    }

    pub fn parse(s: &str) -> Option<Status> {
        match s {
            "Todo" => Some(Status::Todo),
            "In Progress" => Some(Status::InProgress),
            "Done" => Some(Status::Done),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }

    pub fn parse(s: &str) -> Option<Priority> {
        match s {
            "Low" => Some(Priority::Low),
            "Medium" => Some(Priority::Medium),
            "High" => Some(Priority::High),
            _ => None,
        }
    }
}

// ─── Views ────────────────────────────────────────────────────────────────────

/// Assignee summary embedded in task responses and events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub email: String,
}

/// A task with its assignee resolved — the shape every success response and
/// task event carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: Status,
    pub priority: Priority,
    pub assigned_user: Option<UserSummary>,
    /// Optimistic-concurrency token.  Echo this back as `version` on update.
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

// ─── Requests ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    /// User id of the initial assignee.
    pub assigned_user: Option<String>,
}

/// Distinguishes an absent field from an explicit null: `None` = leave
/// unchanged, `Some(None)` = clear, `Some(Some(v))` = set.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Partial update — only fields present in the request are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub assigned_user: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// Bad, duplicate, or reserved title.  Recoverable; no state change.
    #[error("{0}")]
    Validation(String),
    /// Version mismatch.  Carries both snapshots for human resolution;
    /// no state change, nothing broadcast.
    #[error("Conflict detected")]
    Conflict {
        server: Box<TaskView>,
        /// The caller's submitted fields, echoed back verbatim.
        client: Value,
    },
    #[error("Task not found")]
    TaskNotFound,
    #[error("No users found")]
    NoEligibleUser,
    /// Store access failure — fatal to the request, never retried.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type BoardResult<T> = Result<T, BoardError>;

// ─── Board ────────────────────────────────────────────────────────────────────

/// Single-board aggregate.  Holds no cached task state — every operation
/// re-reads through the store, which is the only serialization point.
pub struct Board {
    storage: Arc<Storage>,
    broadcaster: Arc<dyn Broadcaster>,
    ledger: ActivityLedger,
}

impl Board {
    pub fn new(storage: Arc<Storage>, broadcaster: Arc<dyn Broadcaster>, retention: i64) -> Self {
        let ledger = ActivityLedger::new(storage.clone(), retention);
        Self {
            storage,
            broadcaster,
            ledger,
        }
    }

    pub fn ledger(&self) -> &ActivityLedger {
        &self.ledger
    }

    // ─── Operations ───────────────────────────────────────────────────────────

    pub async fn create_task(&self, req: NewTask, username: &str) -> BoardResult<TaskView> {
        let title = req.title.as_str();
        if title.is_empty() {
            return Err(BoardError::Validation("Title is required".to_string()));
        }
        if RESERVED_TITLES.contains(&title) {
            return Err(BoardError::Validation(
                "Title cannot match column names".to_string(),
            ));
        }
        if self.storage.find_task_by_title(title).await?.is_some() {
            return Err(BoardError::Validation(
                "Task title must be unique".to_string(),
            ));
        }

        let row = self
            .storage
            .create_task(
                title,
                req.description.as_deref(),
                req.status.unwrap_or(Status::Todo).as_str(),
                req.priority.unwrap_or(Priority::Medium).as_str(),
                req.assigned_user.as_deref(),
            )
            .await?;

        let view = self.resolve(row).await?;
        self.finish_mutation(
            username,
            format!("created task '{}'", view.title),
            EVENT_TASK_CREATED,
            serde_json::to_value(&view).unwrap_or_default(),
        )
        .await;
        Ok(view)
    }

    pub async fn update_task(
        &self,
        id: &str,
        patch: TaskPatch,
        client_version: Option<i64>,
        username: &str,
    ) -> BoardResult<TaskView> {
        let mut row = self
            .storage
            .get_task(id)
            .await?
            .ok_or(BoardError::TaskNotFound)?;

        // Conflict detection: strict equality against the caller's last-known
        // token.  Any drift — even one generation — conflicts.
        if let Some(v) = client_version {
            if v != row.version {
                let server = self.resolve(row).await?;
                return Err(BoardError::Conflict {
                    server: Box::new(server),
                    client: serde_json::to_value(&patch).unwrap_or_default(),
                });
            }
        }

        // Title validation only when the title is being changed.  Empty-string
        // titles are treated as absent, matching the original surface.
        if let Some(title) = patch.title.as_deref().filter(|t| !t.is_empty()) {
            if RESERVED_TITLES.contains(&title) {
                return Err(BoardError::Validation(
                    "Title cannot match column names".to_string(),
                ));
            }
            if title != row.title && self.storage.find_task_by_title(title).await?.is_some() {
                return Err(BoardError::Validation(
                    "Task title must be unique".to_string(),
                ));
            }
        }

        // Apply only the fields present in the request.  Explicit null/empty
        // description and assignee ARE applied.
        if let Some(title) = patch.title.as_ref().filter(|t| !t.is_empty()) {
            row.title = title.clone();
        }
        if let Some(description) = patch.description {
            row.description = description;
        }
        if let Some(assigned) = patch.assigned_user {
            row.assigned_user = assigned;
        }
        if let Some(status) = patch.status {
            row.status = status.as_str().to_string();
        }
        if let Some(priority) = patch.priority {
            row.priority = priority.as_str().to_string();
        }

        row.version += 1;
        self.storage.update_task(&row).await?;

        // Re-read so the view carries the store's updated_at stamp.
        let row = self
            .storage
            .get_task(id)
            .await?
            .ok_or(BoardError::TaskNotFound)?;
        let view = self.resolve(row).await?;
        self.finish_mutation(
            username,
            format!("updated task '{}'", view.title),
            EVENT_TASK_UPDATED,
            serde_json::to_value(&view).unwrap_or_default(),
        )
        .await;
        Ok(view)
    }

    pub async fn delete_task(&self, id: &str, username: &str) -> BoardResult<()> {
        let row = self
            .storage
            .get_task(id)
            .await?
            .ok_or(BoardError::TaskNotFound)?;

        // A concurrent delete may win the race between read and delete.
        if !self.storage.delete_task(id).await? {
            return Err(BoardError::TaskNotFound);
        }

        self.finish_mutation(
            username,
            format!("deleted task '{}'", row.title),
            EVENT_TASK_DELETED,
            json!({ "id": row.id }),
        )
        .await;
        Ok(())
    }

    pub async fn smart_assign(&self, id: &str, username: &str) -> BoardResult<TaskView> {
        let mut row = self
            .storage
            .get_task(id)
            .await?
            .ok_or(BoardError::TaskNotFound)?;

        // Earliest-created-first ordering is the documented tie-break.
        let users = self.storage.list_users().await?;
        let mut candidates = Vec::with_capacity(users.len());
        for user in users {
            let count = self.storage.count_open_tasks(&user.id).await?;
            candidates.push((user, count));
        }
        let best = balancer::select(&candidates).ok_or(BoardError::NoEligibleUser)?;
        let assignee = best.username.clone();

        row.assigned_user = Some(best.id.clone());
        row.version += 1;
        self.storage.update_task(&row).await?;

        let row = self
            .storage
            .get_task(id)
            .await?
            .ok_or(BoardError::TaskNotFound)?;
        let view = self.resolve(row).await?;
        self.finish_mutation(
            username,
            format!("smart assigned task '{}' to '{}'", view.title, assignee),
            EVENT_TASK_UPDATED,
            serde_json::to_value(&view).unwrap_or_default(),
        )
        .await;
        Ok(view)
    }

    pub async fn list_tasks(&self) -> BoardResult<Vec<TaskView>> {
        let rows = self.storage.list_tasks().await?;
        let users: HashMap<String, UserRow> = self
            .storage
            .list_users()
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();
        Ok(rows
            .into_iter()
            .map(|row| view_with(row, |id| users.get(id).cloned()))
            .collect())
    }

    pub async fn get_task(&self, id: &str) -> BoardResult<TaskView> {
        let row = self
            .storage
            .get_task(id)
            .await?
            .ok_or(BoardError::TaskNotFound)?;
        self.resolve(row).await
    }

    // ─── Side-effect pipeline ─────────────────────────────────────────────────

    /// Runs the post-persist tail of a mutation: ledger append + retention
    /// trim, then the task event, then its activity event.  The task write is
    /// already durable; a ledger failure is logged and swallowed so it never
    /// fails the mutation.
    async fn finish_mutation(&self, username: &str, action: String, event: &str, payload: Value) {
        let activity = match self.ledger.append(username, &action).await {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(err = %e, action = %action, "activity ledger append failed");
                None
            }
        };
        self.broadcaster.publish(event, payload);
        if let Some(entry) = activity {
            self.broadcaster
                .publish(EVENT_ACTIVITY, serde_json::to_value(&entry).unwrap_or_default());
        }
    }

    async fn resolve(&self, row: TaskRow) -> BoardResult<TaskView> {
        let assignee = match row.assigned_user.as_deref() {
            Some(user_id) => self.storage.get_user(user_id).await?,
            None => None,
        };
        Ok(view_with(row, |_| assignee.clone()))
    }
}

fn view_with(row: TaskRow, lookup: impl Fn(&str) -> Option<UserRow>) -> TaskView {
    let assigned_user = row.assigned_user.as_deref().and_then(&lookup).map(|u| UserSummary {
        id: u.id,
        username: u.username,
        email: u.email,
    });
    TaskView {
        id: row.id,
        title: row.title,
        // Stored rows only ever hold enum spellings; fall back rather than fail a read.
        status: Status::parse(&row.status).unwrap_or(Status::Todo),
        priority: Priority::parse(&row.priority).unwrap_or(Priority::Medium),
        description: row.description,
        assigned_user,
        version: row.version,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_column_spellings() {
        for s in [Status::Todo, Status::InProgress, Status::Done] {
            assert_eq!(Status::parse(s.as_str()), Some(s));
        }
        assert_eq!(Status::parse("InProgress"), None);
        assert_eq!(serde_json::to_value(Status::InProgress).unwrap(), "In Progress");
    }

    #[test]
    fn reserved_titles_are_exactly_the_columns() {
        for s in [Status::Todo, Status::InProgress, Status::Done] {
            assert!(RESERVED_TITLES.contains(&s.as_str()));
        }
        // Exact-match semantics: case variants are allowed.
        assert!(!RESERVED_TITLES.contains(&"todo"));
    }

    #[test]
    fn patch_distinguishes_absent_from_null() {
        let absent: TaskPatch = serde_json::from_str("{}").unwrap();
        assert!(absent.description.is_none());
        assert!(absent.assigned_user.is_none());

        let cleared: TaskPatch =
            serde_json::from_str(r#"{"description": null, "assignedUser": null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));
        assert_eq!(cleared.assigned_user, Some(None));

        let set: TaskPatch = serde_json::from_str(r#"{"description": "d"}"#).unwrap();
        assert_eq!(set.description, Some(Some("d".to_string())));
    }

    #[test]
    fn patch_rejects_malformed_enums() {
        let bad = serde_json::from_str::<TaskPatch>(r#"{"status": "Doing"}"#);
        assert!(bad.is_err());
    }
}

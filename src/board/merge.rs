//! Client-side conflict resolution strategies.
//!
//! The server never merges — it only returns both snapshots.  These pure
//! functions are the resolution intelligence a caller runs over the pair
//! before resubmitting as a normal update (itself subject to a fresh
//! version check, which can conflict again if a third writer interleaves).

use super::{TaskPatch, TaskView};

/// How the human chose to resolve a surfaced conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Resubmit the caller's edits as-is.
    KeepClient,
    /// Discard the caller's edits; nothing to resubmit.
    KeepServer,
    /// Combine both: per field, the client's present/non-empty value wins,
    /// otherwise the server's stands.
    Merge,
}

/// Produce the candidate patch to resubmit, or `None` when the resolution
/// leaves the server state untouched (keep-server / cancel).
pub fn resolve(resolution: Resolution, client: &TaskPatch, server: &TaskView) -> Option<TaskPatch> {
    match resolution {
        Resolution::KeepClient => Some(client.clone()),
        Resolution::KeepServer => None,
        Resolution::Merge => Some(merge(client, server)),
    }
}

/// Field-wise merge of the caller's submitted patch over the server's
/// current snapshot.  Every field of the result is explicit, so resubmitting
/// it fully describes the intended end state.
pub fn merge(client: &TaskPatch, server: &TaskView) -> TaskPatch {
    let title = client
        .title
        .clone()
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| server.title.clone());
    let description = client
        .description
        .clone()
        .flatten()
        .filter(|d| !d.is_empty())
        .or_else(|| server.description.clone());
    let assigned_user = client
        .assigned_user
        .clone()
        .flatten()
        .or_else(|| server.assigned_user.as_ref().map(|u| u.id.clone()));
    TaskPatch {
        title: Some(title),
        description: Some(description),
        assigned_user: Some(assigned_user),
        status: Some(client.status.unwrap_or(server.status)),
        priority: Some(client.priority.unwrap_or(server.priority)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Priority, Status, UserSummary};

    fn server_task() -> TaskView {
        TaskView {
            id: "t1".to_string(),
            title: "Server title".to_string(),
            description: Some("server description".to_string()),
            status: Status::InProgress,
            priority: Priority::High,
            assigned_user: Some(UserSummary {
                id: "u1".to_string(),
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
            }),
            version: 4,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn client_fields_win_when_present() {
        let client = TaskPatch {
            title: Some("Client title".to_string()),
            status: Some(Status::Done),
            ..Default::default()
        };
        let merged = merge(&client, &server_task());
        assert_eq!(merged.title, Some("Client title".to_string()));
        assert_eq!(merged.status, Some(Status::Done));
        // Untouched fields fall back to the server.
        assert_eq!(merged.description, Some(Some("server description".to_string())));
        assert_eq!(merged.assigned_user, Some(Some("u1".to_string())));
        assert_eq!(merged.priority, Some(Priority::High));
    }

    #[test]
    fn empty_client_values_fall_back_to_server() {
        let client = TaskPatch {
            title: Some(String::new()),
            description: Some(Some(String::new())),
            ..Default::default()
        };
        let merged = merge(&client, &server_task());
        assert_eq!(merged.title, Some("Server title".to_string()));
        assert_eq!(merged.description, Some(Some("server description".to_string())));
    }

    #[test]
    fn keep_server_resubmits_nothing() {
        let client = TaskPatch::default();
        assert!(resolve(Resolution::KeepServer, &client, &server_task()).is_none());
    }

    #[test]
    fn keep_client_passes_the_patch_through() {
        let client = TaskPatch {
            priority: Some(Priority::Low),
            ..Default::default()
        };
        let resolved = resolve(Resolution::KeepClient, &client, &server_task()).unwrap();
        assert_eq!(resolved.priority, Some(Priority::Low));
        assert!(resolved.title.is_none());
    }

    #[test]
    fn merge_result_is_fully_explicit() {
        let merged = merge(&TaskPatch::default(), &server_task());
        assert!(merged.title.is_some());
        assert!(merged.description.is_some());
        assert!(merged.assigned_user.is_some());
        assert!(merged.status.is_some());
        assert!(merged.priority.is_some());
    }
}

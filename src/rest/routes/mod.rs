pub mod activity;
pub mod health;
pub mod tasks;
pub mod users;

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::{json, Value};

use crate::board::BoardError;
use crate::AppContext;

pub(crate) type RestError = (StatusCode, Json<Value>);

/// Enforce the optional REST bearer token.  `api_token = None` disables auth
/// (local-only, trusted loopback use).
pub(crate) fn check_auth(ctx: &AppContext, headers: &HeaderMap) -> Result<(), RestError> {
    let Some(expected) = ctx.config.api_token.as_deref() else {
        return Ok(());
    };
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| crate::ipc::auth::validate_bearer(v, expected))
        .unwrap_or(false);
    if authorized {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Unauthorized" })),
        ))
    }
}

/// The acting identity, as handed to us by the caller.
pub(crate) fn username(headers: &HeaderMap) -> String {
    headers
        .get("x-username")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .unwrap_or("anonymous")
        .to_string()
}

/// Map the board taxonomy to HTTP status codes.
pub(crate) fn map_board_error(e: BoardError) -> RestError {
    match e {
        BoardError::Validation(msg) => (StatusCode::BAD_REQUEST, Json(json!({ "message": msg }))),
        BoardError::Conflict { server, client } => (
            StatusCode::CONFLICT,
            Json(json!({
                "message": "Conflict detected",
                "serverTask": server,
                "clientTask": client,
            })),
        ),
        BoardError::TaskNotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Task not found" })),
        ),
        BoardError::NoEligibleUser => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "No users found" })),
        ),
        BoardError::Storage(inner) => {
            tracing::error!(err = %inner, "storage error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Server error" })),
            )
        }
    }
}

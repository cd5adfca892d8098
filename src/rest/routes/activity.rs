use axum::{extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use super::{check_auth, RestError};
use crate::AppContext;

/// The most recent ledger entries, newest first.
pub async fn list_activity(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<Json<Value>, RestError> {
    check_auth(&ctx, &headers)?;
    let entries = ctx.board.ledger().list(None).await.map_err(|e| {
        tracing::error!(err = %e, "storage error");
        (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "Server error" })),
        )
    })?;
    Ok(Json(json!(entries)))
}

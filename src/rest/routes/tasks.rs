// rest/routes/tasks.rs — Task mutation surface.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{check_auth, map_board_error, username, RestError};
use crate::board::{NewTask, TaskPatch};
use crate::AppContext;

pub async fn list_tasks(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<Json<Value>, RestError> {
    check_auth(&ctx, &headers)?;
    let tasks = ctx.board.list_tasks().await.map_err(map_board_error)?;
    Ok(Json(json!(tasks)))
}

pub async fn create_task(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(body): Json<NewTask>,
) -> Result<(StatusCode, Json<Value>), RestError> {
    check_auth(&ctx, &headers)?;
    let task = ctx
        .board
        .create_task(body, &username(&headers))
        .await
        .map_err(map_board_error)?;
    Ok((StatusCode::CREATED, Json(json!(task))))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    /// The caller's last-known version token; omit to skip conflict detection.
    pub version: Option<i64>,
    #[serde(flatten)]
    pub patch: TaskPatch,
}

pub async fn update_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<UpdateTaskRequest>,
) -> Result<Json<Value>, RestError> {
    check_auth(&ctx, &headers)?;
    let task = ctx
        .board
        .update_task(&id, body.patch, body.version, &username(&headers))
        .await
        .map_err(map_board_error)?;
    Ok(Json(json!(task)))
}

pub async fn delete_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, RestError> {
    check_auth(&ctx, &headers)?;
    ctx.board
        .delete_task(&id, &username(&headers))
        .await
        .map_err(map_board_error)?;
    Ok(Json(json!({ "message": "Task deleted" })))
}

pub async fn smart_assign(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, RestError> {
    check_auth(&ctx, &headers)?;
    let task = ctx
        .board
        .smart_assign(&id, &username(&headers))
        .await
        .map_err(map_board_error)?;
    Ok(Json(json!(task)))
}

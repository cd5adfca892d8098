use super::username;
use crate::board::{NewTask, TaskPatch};
use crate::AppContext;
use anyhow::Result;
use serde_json::{json, Value};

pub async fn list(_params: Value, ctx: &AppContext) -> Result<Value> {
    let tasks = ctx.board.list_tasks().await?;
    Ok(json!({ "tasks": tasks }))
}

pub async fn create(params: Value, ctx: &AppContext) -> Result<Value> {
    let user = username(&params);
    let req: NewTask = serde_json::from_value(params)?;
    let task = ctx.board.create_task(req, &user).await?;
    Ok(json!({ "task": task }))
}

pub async fn update(params: Value, ctx: &AppContext) -> Result<Value> {
    let id = params
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing field `id`"))?
        .to_string();
    // The caller's last-known version token; omit to skip conflict detection.
    let client_version = params.get("version").and_then(Value::as_i64);
    let user = username(&params);
    let patch: TaskPatch = serde_json::from_value(params)?;
    let task = ctx
        .board
        .update_task(&id, patch, client_version, &user)
        .await?;
    Ok(json!({ "task": task }))
}

pub async fn delete(params: Value, ctx: &AppContext) -> Result<Value> {
    let id = params
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing field `id`"))?;
    ctx.board.delete_task(id, &username(&params)).await?;
    Ok(json!({ "message": "Task deleted" }))
}

pub async fn smart_assign(params: Value, ctx: &AppContext) -> Result<Value> {
    let id = params
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing field `id`"))?;
    let task = ctx.board.smart_assign(id, &username(&params)).await?;
    Ok(json!({ "task": task }))
}

use crate::AppContext;
use anyhow::Result;
use serde_json::{json, Value};

pub async fn list(_params: Value, ctx: &AppContext) -> Result<Value> {
    let users = ctx.storage.list_users().await?;
    Ok(json!({ "users": users }))
}

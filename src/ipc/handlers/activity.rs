use crate::AppContext;
use anyhow::Result;
use serde_json::{json, Value};

pub async fn list(params: Value, ctx: &AppContext) -> Result<Value> {
    let limit = params.get("limit").and_then(Value::as_i64);
    let entries = ctx.board.ledger().list(limit).await?;
    Ok(json!({ "activity": entries }))
}

pub mod activity;
pub mod daemon;
pub mod tasks;
pub mod users;

use serde_json::Value;

/// The acting identity, as handed to us by the transport.  The daemon trusts
/// it — identity issuance and verification live outside this core.
pub(crate) fn username(params: &Value) -> String {
    params
        .get("username")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("anonymous")
        .to_string()
}

use boardd::{config::DaemonConfig, storage::Storage, AppContext};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
/// Integration tests for the boardd JSON-RPC server.
/// Spins up a real daemon on a free port and drives it over WebSocket.
use std::io::{Read as _, Write as _};
use std::net::TcpStream;
use std::sync::Arc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Start a daemon on a random port and return the WebSocket URL.
async fn start_test_daemon() -> (String, Arc<AppContext>) {
    start_test_daemon_with_token(String::new()).await
}

async fn start_test_daemon_with_token(auth_token: String) -> (String, Arc<AppContext>) {
    let data_dir = tempfile::tempdir().unwrap().keep();
    let port = get_free_port();

    let config = Arc::new(DaemonConfig::new(
        Some(port),
        Some(data_dir.clone()),
        Some("warn".to_string()),
        None,
    ));
    let storage = Arc::new(Storage::new(&data_dir).await.unwrap());
    let ctx = Arc::new(AppContext::new(config, storage, auth_token));

    let ctx_server = ctx.clone();
    tokio::spawn(async move {
        boardd::ipc::run(ctx_server).await.ok();
    });

    // Give server a moment to bind
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let url = format!("ws://127.0.0.1:{}", ctx.config.port);
    (url, ctx)
}

fn get_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn ws_rpc(url: &str, method: &str, params: Value) -> Value {
    let (mut ws, _) = connect_async(url).await.expect("ws connect failed");

    let request = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params
    });
    ws.send(Message::Text(serde_json::to_string(&request).unwrap()))
        .await
        .unwrap();

    // Read messages until we get the response (skip notifications)
    loop {
        let msg = ws.next().await.unwrap().unwrap();
        if let Message::Text(text) = msg {
            let v: Value = serde_json::from_str(&text).unwrap();
            if v.get("id").is_some() {
                return v;
            }
        }
    }
}

#[tokio::test]
async fn test_board_ping() {
    let (url, _ctx) = start_test_daemon().await;
    let resp = ws_rpc(&url, "board.ping", json!({})).await;
    assert_eq!(resp["result"]["pong"], true);
}

#[tokio::test]
async fn test_board_status() {
    let (url, _ctx) = start_test_daemon().await;
    let resp = ws_rpc(&url, "board.status", json!({})).await;
    let result = &resp["result"];
    assert!(result["version"].is_string());
    assert!(result["uptime"].is_number());
    assert_eq!(result["tasks"], 0);
    assert_eq!(result["users"], 0);
}

#[tokio::test]
async fn test_method_not_found() {
    let (url, _ctx) = start_test_daemon().await;
    let resp = ws_rpc(&url, "no.such.method", json!({})).await;
    assert_eq!(resp["error"]["code"], -32601);
}

#[tokio::test]
async fn test_task_create_list_update_delete() {
    let (url, _ctx) = start_test_daemon().await;

    // Create
    let resp = ws_rpc(
        &url,
        "task.create",
        json!({
            "title": "Write release notes",
            "priority": "High",
            "username": "alice"
        }),
    )
    .await;
    assert!(resp.get("error").is_none(), "create error: {:?}", resp);
    let task = &resp["result"]["task"];
    let task_id = task["id"].as_str().unwrap().to_string();
    assert_eq!(task["title"], "Write release notes");
    assert_eq!(task["status"], "Todo");
    assert_eq!(task["priority"], "High");
    assert_eq!(task["version"], 1);

    // List
    let list_resp = ws_rpc(&url, "task.list", json!({})).await;
    let tasks = list_resp["result"]["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], task_id);

    // Update with a matching version token
    let update_resp = ws_rpc(
        &url,
        "task.update",
        json!({
            "id": task_id,
            "version": 1,
            "status": "In Progress",
            "username": "alice"
        }),
    )
    .await;
    assert!(
        update_resp.get("error").is_none(),
        "update error: {:?}",
        update_resp
    );
    assert_eq!(update_resp["result"]["task"]["status"], "In Progress");
    assert_eq!(update_resp["result"]["task"]["version"], 2);

    // Delete
    let del_resp = ws_rpc(
        &url,
        "task.delete",
        json!({ "id": task_id, "username": "alice" }),
    )
    .await;
    assert_eq!(del_resp["result"]["message"], "Task deleted");

    // List should be empty
    let list_again = ws_rpc(&url, "task.list", json!({})).await;
    assert!(list_again["result"]["tasks"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_task_not_found() {
    let (url, _ctx) = start_test_daemon().await;
    let resp = ws_rpc(&url, "task.delete", json!({ "id": "nonexistent-id" })).await;
    assert_eq!(resp["error"]["code"], -32010);
    assert_eq!(resp["error"]["message"], "Task not found");
}

#[tokio::test]
async fn test_reserved_title_rejected() {
    let (url, _ctx) = start_test_daemon().await;
    let resp = ws_rpc(&url, "task.create", json!({ "title": "In Progress" })).await;
    assert_eq!(resp["error"]["code"], -32011);
    assert_eq!(resp["error"]["message"], "Title cannot match column names");
}

#[tokio::test]
async fn test_stale_version_returns_conflict_with_both_snapshots() {
    let (url, _ctx) = start_test_daemon().await;

    let created = ws_rpc(&url, "task.create", json!({ "title": "Contested" })).await;
    let task_id = created["result"]["task"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    // First writer advances the version.
    let first = ws_rpc(
        &url,
        "task.update",
        json!({ "id": task_id, "version": 1, "title": "Contested (A)" }),
    )
    .await;
    assert!(first.get("error").is_none());

    // Second writer still holds version 1.
    let second = ws_rpc(
        &url,
        "task.update",
        json!({ "id": task_id, "version": 1, "title": "Contested (B)" }),
    )
    .await;
    let err = &second["error"];
    assert_eq!(err["code"], -32012);
    assert_eq!(err["message"], "Conflict detected");
    assert_eq!(err["data"]["serverTask"]["title"], "Contested (A)");
    assert_eq!(err["data"]["serverTask"]["version"], 2);
    assert_eq!(err["data"]["clientTask"]["title"], "Contested (B)");
}

#[tokio::test]
async fn test_smart_assign_without_users() {
    let (url, _ctx) = start_test_daemon().await;
    let created = ws_rpc(&url, "task.create", json!({ "title": "Unassignable" })).await;
    let task_id = created["result"]["task"]["id"].as_str().unwrap();

    let resp = ws_rpc(&url, "task.smartAssign", json!({ "id": task_id })).await;
    assert_eq!(resp["error"]["code"], -32013);
    assert_eq!(resp["error"]["message"], "No users found");
}

#[tokio::test]
async fn test_smart_assign_and_activity_feed() {
    let (url, ctx) = start_test_daemon().await;
    ctx.storage
        .create_user("ann", "ann@example.com")
        .await
        .unwrap();

    let created = ws_rpc(
        &url,
        "task.create",
        json!({ "title": "Needs owner", "username": "bob" }),
    )
    .await;
    let task_id = created["result"]["task"]["id"].as_str().unwrap();

    let resp = ws_rpc(
        &url,
        "task.smartAssign",
        json!({ "id": task_id, "username": "bob" }),
    )
    .await;
    let task = &resp["result"]["task"];
    assert_eq!(task["assignedUser"]["username"], "ann");
    assert_eq!(task["version"], 2);

    let users = ws_rpc(&url, "user.list", json!({})).await;
    assert_eq!(users["result"]["users"].as_array().unwrap().len(), 1);

    // Activity feed is newest-first.
    let activity = ws_rpc(&url, "activity.list", json!({})).await;
    let entries = activity["result"]["activity"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(
        entries[0]["action"],
        "smart assigned task 'Needs owner' to 'ann'"
    );
    assert_eq!(entries[0]["username"], "bob");
    assert_eq!(entries[1]["action"], "created task 'Needs owner'");
}

#[tokio::test]
async fn test_mutation_broadcast_reaches_observer() {
    let (url, _ctx) = start_test_daemon().await;

    // Second connection only observes.
    let (mut observer, _) = connect_async(&url).await.expect("ws connect failed");
    // Let the server-side task reach its subscribe call before mutating.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let resp = ws_rpc(&url, "task.create", json!({ "title": "Broadcast me" })).await;
    assert!(resp.get("error").is_none());

    // The observer sees taskCreated then activity, as id-less notifications.
    let mut seen = Vec::new();
    while seen.len() < 2 {
        let msg = tokio::time::timeout(std::time::Duration::from_secs(5), observer.next())
            .await
            .expect("no broadcast within 5s")
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            let v: Value = serde_json::from_str(&text).unwrap();
            if v.get("id").is_none() {
                seen.push(v["method"].as_str().unwrap().to_string());
            }
        }
    }
    assert_eq!(seen, vec!["taskCreated".to_string(), "activity".to_string()]);
}

#[tokio::test]
async fn test_auth_required_when_token_set() {
    let (url, _ctx) = start_test_daemon_with_token("secret-token".to_string()).await;

    // Any first method other than board.auth is rejected.
    let resp = ws_rpc(&url, "board.ping", json!({})).await;
    assert_eq!(resp["error"]["code"], -32004);

    // Wrong token is rejected.
    let resp = ws_rpc(&url, "board.auth", json!({ "token": "wrong" })).await;
    assert_eq!(resp["error"]["code"], -32004);

    // Correct token authenticates and the connection stays usable.
    let (mut ws, _) = connect_async(&url).await.expect("ws connect failed");
    let auth = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "board.auth",
        "params": { "token": "secret-token" }
    });
    ws.send(Message::Text(auth.to_string())).await.unwrap();
    let reply: Value = match ws.next().await.unwrap().unwrap() {
        Message::Text(t) => serde_json::from_str(&t).unwrap(),
        other => panic!("unexpected frame: {other:?}"),
    };
    assert_eq!(reply["result"]["authenticated"], true);

    let ping = json!({ "jsonrpc": "2.0", "id": 2, "method": "board.ping", "params": {} });
    ws.send(Message::Text(ping.to_string())).await.unwrap();
    loop {
        if let Message::Text(t) = ws.next().await.unwrap().unwrap() {
            let v: Value = serde_json::from_str(&t).unwrap();
            if v.get("id").is_some() {
                assert_eq!(v["result"]["pong"], true);
                break;
            }
        }
    }
}

#[tokio::test]
async fn test_parse_error() {
    let (url, _ctx) = start_test_daemon().await;

    let (mut ws, _) = connect_async(&url).await.expect("ws connect failed");
    ws.send(Message::Text("not json".to_string())).await.unwrap();
    let reply: Value = match ws.next().await.unwrap().unwrap() {
        Message::Text(t) => serde_json::from_str(&t).unwrap(),
        other => panic!("unexpected frame: {other:?}"),
    };
    assert_eq!(reply["error"]["code"], -32700);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (_url, ctx) = start_test_daemon().await;
    let port = ctx.config.port;

    // Give the server a moment to be ready
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    // Use a blocking TCP connection in a spawn_blocking to avoid mixing sync I/O
    let result = tokio::task::spawn_blocking(move || {
        let mut stream = TcpStream::connect(format!("127.0.0.1:{port}"))?;
        stream.write_all(b"GET /health HTTP/1.0\r\nHost: localhost\r\n\r\n")?;
        let mut response = String::new();
        stream.read_to_string(&mut response)?;
        Ok::<String, std::io::Error>(response)
    })
    .await
    .unwrap()
    .expect("TCP connect failed");

    // Extract the JSON body (after the blank line separating headers from body)
    let body = result.split("\r\n\r\n").nth(1).unwrap_or(&result);
    let json: serde_json::Value = serde_json::from_str(body).expect("health body is not JSON");

    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert!(json["uptime"].is_number());
    assert!(json["port"].is_number());
}

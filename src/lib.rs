pub mod board;
pub mod config;
pub mod ipc;
pub mod rest;
pub mod storage;

// Re-export auth so main.rs can use boardd::auth directly.
pub use ipc::auth;

use std::sync::Arc;

use board::Board;
use config::DaemonConfig;
use ipc::event::EventBroadcaster;
use storage::Storage;

/// Shared application state passed to every RPC handler and REST route.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<DaemonConfig>,
    pub storage: Arc<Storage>,
    pub broadcaster: Arc<EventBroadcaster>,
    /// The board aggregate — every task mutation goes through it.
    pub board: Arc<Board>,
    pub started_at: std::time::Instant,
    /// Local WebSocket auth token.  Every new connection must send a
    /// `board.auth` RPC with this token before any other method call.
    /// Empty string means auth is disabled (not recommended).
    pub auth_token: String,
}

impl AppContext {
    /// Assemble the full context from its leaves.  Used by `main` and by
    /// integration tests that spin up a real daemon.
    pub fn new(config: Arc<DaemonConfig>, storage: Arc<Storage>, auth_token: String) -> Self {
        let broadcaster = Arc::new(EventBroadcaster::new());
        let board = Arc::new(Board::new(
            storage.clone(),
            broadcaster.clone(),
            config.activity_retention,
        ));
        Self {
            config,
            storage,
            broadcaster,
            board,
            started_at: std::time::Instant::now(),
            auth_token,
        }
    }
}

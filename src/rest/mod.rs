// rest/mod.rs — REST bridge over the board engine.
//
// Axum HTTP server on port+1, mirroring the mutation surface for callers
// without a WebSocket library.  Real-time events stay on the WS channel.
//
// Endpoints:
//   GET    /api/v1/tasks
//   POST   /api/v1/tasks
//   PUT    /api/v1/tasks/{id}
//   DELETE /api/v1/tasks/{id}
//   POST   /api/v1/tasks/{id}/smart-assign
//   GET    /api/v1/users
//   GET    /api/v1/activity
//   GET    /api/v1/health

pub mod routes;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.rest_port());
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("REST API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        // Health (no auth)
        .route("/api/v1/health", get(routes::health::health))
        // Tasks
        .route(
            "/api/v1/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/api/v1/tasks/{id}",
            axum::routing::put(routes::tasks::update_task).delete(routes::tasks::delete_task),
        )
        .route(
            "/api/v1/tasks/{id}/smart-assign",
            post(routes::tasks::smart_assign),
        )
        // Users + activity
        .route("/api/v1/users", get(routes::users::list_users))
        .route("/api/v1/activity", get(routes::activity::list_activity))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

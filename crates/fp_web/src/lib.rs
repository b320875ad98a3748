use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use fp_core::Result;
use tower_http::cors::CorsLayer;
use tracing::info;

pub mod client;
pub mod error;
pub mod handlers;
pub mod state;
pub mod wire;

pub use client::HttpSyncClient;
pub use error::ApiError;
pub use state::AppState;

pub async fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/api/posts", post(handlers::store_post))
        .route("/api/posts/query", post(handlers::query_posts))
        .route("/api/lists", post(handlers::create_list))
        .route("/api/lists/:id", get(handlers::load_list).post(handlers::save_list))
        .route("/api/lists/:id/newer", get(handlers::check_newer_version))
        .route(
            "/api/lists/:id/preview",
            get(handlers::load_preview).post(handlers::save_preview),
        )
        .route("/api/setup", get(handlers::load_setup).post(handlers::save_setup))
        .route("/api/render", get(handlers::render))
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let app = create_app(state).await;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🌐 Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

pub mod prelude {
    pub use crate::wire::ACTOR_HEADER;
    pub use crate::{create_app, serve, AppState, HttpSyncClient};
    pub use fp_core::{Error, Result};
}

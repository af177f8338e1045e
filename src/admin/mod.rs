//! Administrative HTTP surface.
//!
//! Every route requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::config::AdminConfig;
use crate::lifecycle::Shutdown;
use crate::registry::ResilienceRegistry;

#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<ResilienceRegistry>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(registry: Arc<ResilienceRegistry>, api_key: &str) -> Self {
        Self {
            registry,
            api_key: Arc::from(api_key),
        }
    }
}

#[allow(deprecated)]
pub fn setup_admin_router(state: AdminState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/breakers", get(get_breakers))
        .route("/admin/breakers/{name}/reset", post(reset_breaker))
        .route("/admin/caches", get(get_caches))
        .route("/admin/caches/{namespace}/clear", post(clear_cache))
        .route("/admin/persistence", get(get_persistence))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    registry: Arc<ResilienceRegistry>,
    config: &AdminConfig,
    shutdown: &Shutdown,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    let router = setup_admin_router(
        AdminState::new(registry, &config.api_key),
        Duration::from_secs(config.request_timeout_secs),
    );
    let shutdown = shutdown.clone();

    tracing::info!(address = %addr, "Admin API listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await?;
    tracing::info!("Admin API stopped");
    Ok(())
}

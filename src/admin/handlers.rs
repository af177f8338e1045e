use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::cache::CacheStats;
use crate::registry::HealthSnapshot;
use crate::resilience::{BreakerSnapshot, CircuitState};
use crate::store::QueueStats;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    #[serde(flatten)]
    pub health: HealthSnapshot,
}

#[derive(Serialize)]
pub struct BreakerReset {
    pub name: String,
    pub state: CircuitState,
}

#[derive(Serialize)]
pub struct CacheCleared {
    pub namespace: String,
    pub removed: u64,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let health = state.registry.health();
    let status = if health.open_circuits == 0 {
        "operational"
    } else {
        "degraded"
    };
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status,
        health,
    })
}

pub async fn get_breakers(State(state): State<AdminState>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.registry.breakers().snapshots())
}

pub async fn reset_breaker(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<BreakerReset>, StatusCode> {
    if !state.registry.reset_breaker(&name).await {
        return Err(StatusCode::NOT_FOUND);
    }
    tracing::info!(dependency = %name, "Breaker reset via admin API");
    let current = state.registry.breaker(&name).state();
    Ok(Json(BreakerReset {
        name,
        state: current,
    }))
}

pub async fn get_caches(State(state): State<AdminState>) -> Json<BTreeMap<String, CacheStats>> {
    Json(state.registry.cache_stats())
}

pub async fn clear_cache(
    State(state): State<AdminState>,
    Path(namespace): Path<String>,
) -> Result<Json<CacheCleared>, StatusCode> {
    let removed = state
        .registry
        .clear_cache(&namespace)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;
    tracing::info!(namespace = %namespace, removed, "Cache cleared via admin API");
    Ok(Json(CacheCleared { namespace, removed }))
}

pub async fn get_persistence(State(state): State<AdminState>) -> Json<QueueStats> {
    Json(state.registry.store().queue().stats())
}

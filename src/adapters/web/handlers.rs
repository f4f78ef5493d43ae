//! HTTP request handlers for the web adapter.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::engine::EngineState;
use crate::domain::interval::Interval;
use crate::domain::metrics::PerformanceSummary;
use crate::domain::position::Trade;
use crate::domain::snapshot::AssetSnapshot;

use super::{AppState, WebError, RECENT_TRADES};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cycle: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct SignalsResponse {
    pub cycle: u64,
    pub interval: Interval,
    pub updated_at: Option<DateTime<Utc>>,
    pub signals: BTreeMap<String, AssetSnapshot>,
}

impl From<&EngineState> for SignalsResponse {
    fn from(state: &EngineState) -> Self {
        SignalsResponse {
            cycle: state.cycle,
            interval: state.interval,
            updated_at: state.updated_at,
            signals: state.snapshots.clone(),
        }
    }
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let current = state.engine.state();
    Json(HealthResponse {
        status: "ok",
        cycle: current.cycle,
        updated_at: current.updated_at,
    })
}

pub async fn signals(State(state): State<Arc<AppState>>) -> Json<SignalsResponse> {
    Json(SignalsResponse::from(state.engine.state().as_ref()))
}

pub async fn performance(State(state): State<Arc<AppState>>) -> Json<PerformanceSummary> {
    Json(state.engine.performance())
}

pub async fn trades(State(state): State<Arc<AppState>>) -> Json<Vec<Trade>> {
    Json(state.engine.recent_trades(RECENT_TRADES))
}

/// Run one cycle on the requested interval; unknown intervals fall back to 1h.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(interval): Path<String>,
) -> Result<Json<SignalsResponse>, WebError> {
    let interval = Interval::parse_or_default(&interval);
    let engine = Arc::clone(&state.engine);
    let published = tokio::task::spawn_blocking(move || engine.run_cycle(interval))
        .await
        .map_err(|e| WebError::internal(format!("evaluation cycle failed: {e}")))?;
    Ok(Json(SignalsResponse::from(published.as_ref())))
}

pub async fn not_found() -> WebError {
    WebError::not_found("no such endpoint")
}

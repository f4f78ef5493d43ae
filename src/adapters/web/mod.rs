//! HTTP API adapter.
//!
//! JSON endpoints over the engine's read accessors, plus a background task
//! that runs an evaluation cycle on a fixed period.

mod error;
mod handlers;

pub use error::WebError;
pub use handlers::*;

use axum::{Router, routing::get};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::engine::Engine;
use crate::domain::error::BandtraderError;
use crate::domain::interval::Interval;

/// Number of trades returned by `/api/trades`.
pub const RECENT_TRADES: usize = 50;

pub struct AppState {
    pub engine: Arc<Engine>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/signals", get(handlers::signals))
        .route("/api/performance", get(handlers::performance))
        .route("/api/trades", get(handlers::trades))
        .route("/api/update/{interval}", get(handlers::update))
        .fallback(handlers::not_found)
        .with_state(Arc::new(state))
}

/// Run a cycle on `interval` every `period`, on the blocking pool.
pub fn spawn_updater(
    engine: Arc<Engine>,
    interval: Interval,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let engine = Arc::clone(&engine);
            if let Err(e) = tokio::task::spawn_blocking(move || engine.run_cycle(interval)).await {
                tracing::error!(error = %e, "background cycle panicked");
            }
        }
    })
}

/// Bind `listen`, start the updater and serve until the listener fails.
pub async fn serve(
    engine: Arc<Engine>,
    listen: &str,
    refresh: Duration,
) -> Result<(), BandtraderError> {
    let interval = engine.config().interval;
    let updater = spawn_updater(Arc::clone(&engine), interval, refresh);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    tracing::info!(%listen, %interval, refresh_secs = refresh.as_secs(), "serving HTTP API");

    let result = axum::serve(listener, build_router(AppState { engine })).await;
    updater.abort();
    result.map_err(BandtraderError::from)
}

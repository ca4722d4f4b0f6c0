//! HTTP surface for the dashboard: read state, trigger a cycle, toggle sound.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;

use crate::coordinator::{Coordinator, CycleOutcome};
use crate::state::StateView;

#[derive(Serialize)]
pub struct StateResponse {
    #[serde(flatten)]
    view: StateView,
    in_stock_count: usize,
}

#[derive(Serialize)]
pub struct SoundResponse {
    sound_enabled: bool,
}

pub fn router(coordinator: Arc<Coordinator>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/state", get(state_handler))
        .route("/api/scrape", post(scrape_handler))
        .route("/api/sound", post(sound_handler))
        .with_state(coordinator)
}

async fn health() -> &'static str {
    "ok"
}

async fn state_handler(State(coordinator): State<Arc<Coordinator>>) -> Json<StateResponse> {
    let view = coordinator.state().read();
    let in_stock_count = view.in_stock_count();
    Json(StateResponse {
        view,
        in_stock_count,
    })
}

/// Manual trigger. Answers 409 when a cycle is already running.
async fn scrape_handler(
    State(coordinator): State<Arc<Coordinator>>,
) -> (StatusCode, Json<CycleOutcome>) {
    let outcome = coordinator.trigger().await;
    let status = match outcome {
        CycleOutcome::Skipped => StatusCode::CONFLICT,
        _ => StatusCode::OK,
    };
    (status, Json(outcome))
}

async fn sound_handler(State(coordinator): State<Arc<Coordinator>>) -> Json<SoundResponse> {
    let sound_enabled = coordinator.state().toggle_sound();
    tracing::debug!(sound_enabled, "sound preference toggled");
    Json(SoundResponse { sound_enabled })
}

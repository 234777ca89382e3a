use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::ApiError;
use crate::handlers::require_admin;
use crate::round::{self, TimingParams};
use crate::state::AppState;

fn timing_body(t: TimingParams) -> Value {
    json!({
        "ok": true,
        "roundSeconds": t.round_seconds,
        "closeBetsAt": t.close_bets_at,
        "anchorMs": t.anchor_ms,
    })
}

pub async fn get_config_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers)?;
    Ok(Json(timing_body(state.timing().await)))
}

/// Fields left out are unchanged; provided fields pass the guardrails
/// before the snapshot is swapped.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConfigRequest {
    pub round_seconds: Option<i64>,
    pub close_bets_at: Option<i64>,
    pub anchor_ms: Option<f64>,
}

pub async fn update_config_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpdateConfigRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers)?;

    let mut timing = state.timing().await;
    if let Some(round_seconds) = req.round_seconds {
        timing.round_seconds = round_seconds;
    }
    if let Some(close_bets_at) = req.close_bets_at {
        timing.close_bets_at = close_bets_at;
    }
    if let Some(anchor_ms) = req.anchor_ms {
        // Guardrail: a non-finite anchor resets to now.
        timing.anchor_ms = if anchor_ms.is_finite() {
            anchor_ms as i64
        } else {
            round::now_ms()
        };
    }
    let timing = timing.sanitize();
    state.set_timing(timing).await;

    tracing::info!(
        round_seconds = timing.round_seconds,
        close_bets_at = timing.close_bets_at,
        anchor_ms = timing.anchor_ms,
        "timing config updated"
    );

    Ok(Json(timing_body(timing)))
}

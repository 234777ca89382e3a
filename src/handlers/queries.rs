use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::Row;

use crate::db::{LedgerRow, PlayerRow, STATUS_ACTIVE};
use crate::errors::ApiError;
use crate::handlers::require_admin;
use crate::round::{self, now_ms};
use crate::state::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Public round snapshot: current round timing plus the live parameters.
pub async fn round_snapshot(State(state): State<AppState>) -> Json<Value> {
    let params = state.timing().await;
    let info = round::round_info(params, now_ms());
    Json(json!({
        "ok": true,
        "round": info,
        "params": {
            "roundSeconds": params.round_seconds,
            "closeBetsAt": params.close_bets_at,
            "anchorMs": params.anchor_ms,
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

pub async fn player_ledger(
    State(state): State<AppState>,
    Path(player_id): Path<i64>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = q.limit.unwrap_or(50).clamp(1, 200);

    let player = sqlx::query_as::<_, PlayerRow>(
        "SELECT id, username, balance, status, created_at FROM players WHERE id = $1",
    )
    .bind(player_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("player"))?;

    let entries = sqlx::query_as::<_, LedgerRow>(
        "SELECT id, player_id, kind, amount, meta, created_at
         FROM dos_ledger WHERE player_id = $1 ORDER BY id DESC LIMIT $2",
    )
    .bind(player_id)
    .bind(limit)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({
        "ok": true,
        "playerId": player.id,
        "balance": player.balance,
        "entries": entries,
    })))
}

pub async fn leaderboard(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = q.limit.unwrap_or(20).clamp(1, 100);

    let rows = sqlx::query_as::<_, PlayerRow>(
        "SELECT id, username, balance, status, created_at
         FROM players WHERE status = $1 ORDER BY balance DESC, id ASC LIMIT $2",
    )
    .bind(STATUS_ACTIVE)
    .bind(limit)
    .fetch_all(&state.db)
    .await?;

    let entries: Vec<Value> = rows
        .iter()
        .map(|p| json!({ "id": p.id, "username": p.username, "balance": p.balance }))
        .collect();

    Ok(Json(json!({ "ok": true, "leaderboard": entries })))
}

/// Bank snapshot for settlement auditing.
pub async fn bank_snapshot(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers)?;

    let row = sqlx::query("SELECT carry_dos, admin_balance_dos FROM game_bank WHERE id = 1")
        .fetch_one(&state.db)
        .await?;
    let carry_dos: i64 = row.get("carry_dos");
    let admin_balance_dos: i64 = row.get("admin_balance_dos");

    Ok(Json(json!({
        "ok": true,
        "carryDos": carry_dos,
        "adminBalanceDos": admin_balance_dos,
    })))
}

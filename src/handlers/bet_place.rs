use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::Row;

use crate::constants::{CHANCE_MAX, CHANCE_MIN, NUM_MAX, NUM_MIN, PICK_MAX, PICK_MIN};
use crate::db::{KIND_BET, STATUS_ACTIVE};
use crate::errors::ApiError;
use crate::round::{self, now_ms};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBetRequest {
    pub player_id: i64,
    pub nums: Vec<i32>,
    pub chance: i32,
    pub amount: i64,
}

/// Dedup + ascending sort, then bounds: 4..=8 distinct numbers in 1..=20.
fn normalize_nums(raw: &[i32]) -> Result<Vec<i32>, ApiError> {
    let mut nums = raw.to_vec();
    nums.sort_unstable();
    nums.dedup();
    if !(PICK_MIN..=PICK_MAX).contains(&nums.len()) {
        return Err(ApiError::bad_request(
            "pick between 4 and 8 distinct numbers",
        ));
    }
    if nums.iter().any(|n| !(NUM_MIN..=NUM_MAX).contains(n)) {
        return Err(ApiError::bad_request("numbers must be between 1 and 20"));
    }
    Ok(nums)
}

pub async fn place_bet_handler(
    State(state): State<AppState>,
    Json(req): Json<PlaceBetRequest>,
) -> Result<Json<Value>, ApiError> {
    // ─────────────────────────────
    // Validation
    // ─────────────────────────────
    if req.amount <= 0 {
        return Err(ApiError::bad_request("amount must be a positive integer"));
    }
    let nums = normalize_nums(&req.nums)?;
    if !(CHANCE_MIN..=CHANCE_MAX).contains(&req.chance) {
        return Err(ApiError::bad_request("chance must be between 1 and 5"));
    }

    // ─────────────────────────────
    // Betting window
    // ─────────────────────────────
    let info = round::round_info(state.timing().await, now_ms());
    if !info.bets_open {
        return Err(ApiError::conflict_with(
            "bets closed",
            json!({ "roundId": info.round_id, "secToClose": info.seconds_to_close }),
        ));
    }

    let choice = format!(
        "{}#{}",
        nums.iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join("-"),
        req.chance
    );

    // ─────────────────────────────
    // Transaction: lock player, debit, insert bet, append ledger
    // ─────────────────────────────
    let mut tx = state.db.begin().await?;

    let row = sqlx::query("SELECT balance, status FROM players WHERE id = $1 FOR UPDATE")
        .bind(req.player_id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(row) = row else {
        return Err(ApiError::NotFound("player"));
    };
    let balance: i64 = row.get("balance");
    let status: String = row.get("status");
    if status != STATUS_ACTIVE {
        return Err(ApiError::Forbidden);
    }
    if balance < req.amount {
        return Err(ApiError::conflict("insufficient balance"));
    }

    sqlx::query("UPDATE players SET balance = balance - $1 WHERE id = $2")
        .bind(req.amount)
        .bind(req.player_id)
        .execute(&mut *tx)
        .await?;

    let bet_id: i64 = sqlx::query_scalar(
        "INSERT INTO bets (player_id, round_id, nums, chance, amount)
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(req.player_id)
    .bind(info.round_id)
    .bind(&nums)
    .bind(req.chance)
    .bind(req.amount)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO dos_ledger (player_id, kind, amount, meta) VALUES ($1, $2, $3, $4)")
        .bind(req.player_id)
        .bind(KIND_BET)
        .bind(-req.amount)
        .bind(json!({ "betId": bet_id, "roundId": info.round_id, "choice": choice }))
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Json(json!({
        "ok": true,
        "betId": bet_id,
        "roundId": info.round_id,
        "balance": balance - req.amount,
    })))
}

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::Row;

use crate::codes;
use crate::db::{CODE_ACTIVE, CODE_DISABLED, CODE_REDEEMED, KIND_REDEEM, STATUS_ACTIVE};
use crate::errors::ApiError;
use crate::round::now_ms;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemRequest {
    pub player_id: i64,
    pub code: String,
}

/// Redeems a gift code. Single-use: the code row is locked, checked and
/// flipped to REDEEMED in the same transaction that credits the player.
pub async fn redeem_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<RedeemRequest>,
) -> Result<Json<Value>, ApiError> {
    // Every attempt counts against the window, well-formed or not.
    if let Err(retry_after_secs) = state.redeem_limiter.check(addr.ip(), now_ms()) {
        return Err(ApiError::TooManyRequests { retry_after_secs });
    }

    let code = req.code.trim().to_uppercase();
    if !codes::is_valid_format(&code) {
        return Err(ApiError::bad_request("invalid code format"));
    }
    let seed = state.cfg.seed()?;
    let code_hash = codes::code_hash(seed, &code);

    let mut tx = state.db.begin().await?;

    let player = sqlx::query("SELECT balance, status FROM players WHERE id = $1 FOR UPDATE")
        .bind(req.player_id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(player) = player else {
        return Err(ApiError::NotFound("player"));
    };
    let balance: i64 = player.get("balance");
    let status: String = player.get("status");
    if status != STATUS_ACTIVE {
        return Err(ApiError::Forbidden);
    }

    let code_row = sqlx::query(
        "SELECT id, value, status, expires_at FROM gift_codes WHERE code_hash = $1 FOR UPDATE",
    )
    .bind(&code_hash)
    .fetch_optional(&mut *tx)
    .await?;
    let Some(code_row) = code_row else {
        return Err(ApiError::NotFound("gift code"));
    };
    let gift_code_id: i64 = code_row.get("id");
    let value: i64 = code_row.get("value");
    let code_status: String = code_row.get("status");
    let expires_at: Option<chrono::DateTime<Utc>> = code_row.get("expires_at");

    match code_status.as_str() {
        CODE_ACTIVE => {}
        CODE_REDEEMED => return Err(ApiError::conflict("code already used")),
        CODE_DISABLED => return Err(ApiError::conflict("code disabled")),
        _ => return Err(ApiError::conflict("code not redeemable")),
    }
    if let Some(expires_at) = expires_at {
        if expires_at <= Utc::now() {
            return Err(ApiError::conflict("code expired"));
        }
    }

    sqlx::query("UPDATE players SET balance = balance + $1 WHERE id = $2")
        .bind(value)
        .bind(req.player_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE gift_codes SET status = $1, redeemed_by = $2, redeemed_at = now() WHERE id = $3",
    )
    .bind(CODE_REDEEMED)
    .bind(req.player_id)
    .bind(gift_code_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO dos_ledger (player_id, kind, amount, meta) VALUES ($1, $2, $3, $4)")
        .bind(req.player_id)
        .bind(KIND_REDEEM)
        .bind(value)
        .bind(json!({ "giftCodeId": gift_code_id }))
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Json(json!({
        "ok": true,
        "credited": value,
        "balance": balance + value,
    })))
}

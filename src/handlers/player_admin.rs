use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::Row;

use crate::db::{KIND_ADMIN_ADD, KIND_ADMIN_SET, KIND_ADMIN_STATUS, STATUS_ACTIVE, STATUS_SUSPENDED};
use crate::errors::ApiError;
use crate::handlers::require_admin;
use crate::state::AppState;

/// Exactly one of the three fields must be present.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustPlayerRequest {
    pub add_dos: Option<i64>,
    pub set_dos: Option<i64>,
    pub status: Option<String>,
}

/// Admin wallet/status adjustment. Like every other balance mutation it
/// holds the player row lock and appends the matching ledger kind in one
/// transaction.
pub async fn adjust_player_handler(
    State(state): State<AppState>,
    Path(player_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<AdjustPlayerRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers)?;

    let provided =
        req.add_dos.is_some() as u8 + req.set_dos.is_some() as u8 + req.status.is_some() as u8;
    if provided != 1 {
        return Err(ApiError::bad_request(
            "provide exactly one of addDos, setDos, status",
        ));
    }

    let mut tx = state.db.begin().await?;

    let row = sqlx::query("SELECT balance, status FROM players WHERE id = $1 FOR UPDATE")
        .bind(player_id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(row) = row else {
        return Err(ApiError::NotFound("player"));
    };
    let balance: i64 = row.get("balance");
    let status: String = row.get("status");

    let (new_balance, new_status) = if let Some(delta) = req.add_dos {
        if delta == 0 {
            return Err(ApiError::bad_request("addDos must be non-zero"));
        }
        let new_balance = balance
            .checked_add(delta)
            .ok_or_else(|| ApiError::bad_request("balance overflow"))?;
        if new_balance < 0 {
            return Err(ApiError::conflict("insufficient balance"));
        }
        sqlx::query("UPDATE players SET balance = $1 WHERE id = $2")
            .bind(new_balance)
            .bind(player_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO dos_ledger (player_id, kind, amount, meta) VALUES ($1, $2, $3, $4)")
            .bind(player_id)
            .bind(KIND_ADMIN_ADD)
            .bind(delta)
            .bind(json!({}))
            .execute(&mut *tx)
            .await?;
        (new_balance, status)
    } else if let Some(target) = req.set_dos {
        if target < 0 {
            return Err(ApiError::bad_request("setDos must be >= 0"));
        }
        sqlx::query("UPDATE players SET balance = $1 WHERE id = $2")
            .bind(target)
            .bind(player_id)
            .execute(&mut *tx)
            .await?;
        // The ledger records the delta so balance == Σ amounts still holds.
        sqlx::query("INSERT INTO dos_ledger (player_id, kind, amount, meta) VALUES ($1, $2, $3, $4)")
            .bind(player_id)
            .bind(KIND_ADMIN_SET)
            .bind(target - balance)
            .bind(json!({ "target": target }))
            .execute(&mut *tx)
            .await?;
        (target, status)
    } else {
        let requested = req.status.unwrap_or_default();
        if requested != STATUS_ACTIVE && requested != STATUS_SUSPENDED {
            return Err(ApiError::bad_request("status must be ACTIVE or SUSPENDED"));
        }
        sqlx::query("UPDATE players SET status = $1 WHERE id = $2")
            .bind(&requested)
            .bind(player_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO dos_ledger (player_id, kind, amount, meta) VALUES ($1, $2, $3, $4)")
            .bind(player_id)
            .bind(KIND_ADMIN_STATUS)
            .bind(0_i64)
            .bind(json!({ "from": status, "to": requested }))
            .execute(&mut *tx)
            .await?;
        (balance, requested)
    };

    tx.commit().await?;

    tracing::info!(player_id, balance = new_balance, status = %new_status, "player adjusted");

    Ok(Json(json!({
        "ok": true,
        "playerId": player_id,
        "balance": new_balance,
        "status": new_status,
    })))
}

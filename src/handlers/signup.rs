use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::{PlayerRow, KIND_BONUS_SIGNUP};
use crate::errors::{is_unique_violation, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
}

/// Creates a player, crediting the signup bonus (if configured) with its
/// ledger entry in the same transaction.
pub async fn signup_handler(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<Value>, ApiError> {
    let username = req.username.trim().to_string();
    let chars = username.chars().count();
    if chars < 3 {
        return Err(ApiError::bad_request(
            "username must be at least 3 characters",
        ));
    }
    if chars > 64 {
        return Err(ApiError::bad_request("username must be at most 64 characters"));
    }

    let bonus = state.cfg.signup_bonus_dos;

    let mut tx = state.db.begin().await?;

    let inserted = sqlx::query_as::<_, PlayerRow>(
        "INSERT INTO players (username, balance) VALUES ($1, $2)
         RETURNING id, username, balance, status, created_at",
    )
    .bind(&username)
    .bind(bonus)
    .fetch_one(&mut *tx)
    .await;

    let player = match inserted {
        Ok(player) => player,
        Err(err) if is_unique_violation(&err) => {
            return Err(ApiError::conflict("username already taken"));
        }
        Err(err) => return Err(err.into()),
    };

    if bonus > 0 {
        sqlx::query("INSERT INTO dos_ledger (player_id, kind, amount, meta) VALUES ($1, $2, $3, $4)")
            .bind(player.id)
            .bind(KIND_BONUS_SIGNUP)
            .bind(bonus)
            .bind(json!({}))
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    tracing::info!(player_id = player.id, username = %player.username, "player created");

    Ok(Json(json!({ "ok": true, "player": player })))
}

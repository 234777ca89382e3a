use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::Row;

use crate::db::{BetRow, KIND_ADMIN_TAKE, KIND_CARRY, KIND_WIN};
use crate::draw;
use crate::errors::ApiError;
use crate::handlers::require_admin;
use crate::round::{self, now_ms};
use crate::settle;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleRequest {
    pub round_id: Option<i64>,
}

/// Settles one round, exactly once. The `game_bank` row lock is the
/// settlement mutex; a concurrent caller blocks on it and then observes
/// the `round_results` row, so it reports `alreadySettled` instead of
/// double-paying.
pub async fn settle_round_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<SettleRequest>>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers)?;

    let params = state.timing().await;
    let now = now_ms();
    let current_round = round::round_info(params, now).round_id;
    let round_id = body
        .and_then(|Json(req)| req.round_id)
        .unwrap_or(current_round - 1);

    // ─────────────────────────────
    // Preconditions
    // ─────────────────────────────
    if round_id < 0 {
        return Err(ApiError::bad_request("roundId must be >= 0"));
    }
    let target = round::round_by_id(params, round_id, now);
    if now < target.end_ms {
        return Err(ApiError::conflict_with(
            "round not ended yet",
            json!({ "roundId": round_id, "secondsLeft": target.seconds_left }),
        ));
    }
    let seed = state.cfg.seed()?;

    let mut tx = state.db.begin().await?;

    // ─────────────────────────────
    // Bank lock (settlement mutex) + idempotence check
    // ─────────────────────────────
    let bank = sqlx::query("SELECT carry_dos FROM game_bank WHERE id = 1 FOR UPDATE")
        .fetch_one(&mut *tx)
        .await?;
    let carry_in: i64 = bank.get("carry_dos");

    let existing = sqlx::query("SELECT outcome FROM round_results WHERE round_id = $1 FOR UPDATE")
        .bind(round_id)
        .fetch_optional(&mut *tx)
        .await?;
    if let Some(row) = existing {
        let outcome: Value = row.get("outcome");
        return Ok(Json(json!({
            "ok": true,
            "alreadySettled": true,
            "roundId": round_id,
            "outcome": outcome,
        })));
    }

    // ─────────────────────────────
    // Draw + plan
    // ─────────────────────────────
    let stakes: Vec<BetRow> = sqlx::query_as(
        "SELECT id, player_id, round_id, nums, chance, amount
         FROM bets WHERE round_id = $1 AND settled = FALSE
         ORDER BY id ASC FOR UPDATE",
    )
    .bind(round_id)
    .fetch_all(&mut *tx)
    .await?;

    let outcome = draw::draw(seed, round_id)?;
    let plan = settle::build_plan(&stakes, &outcome, carry_in)?;

    // ─────────────────────────────
    // Apply: bets, then player credits in ascending id order
    // ─────────────────────────────
    for bet in &plan.bets {
        sqlx::query("UPDATE bets SET settled = TRUE, payout = $1, category = $2 WHERE id = $3")
            .bind(bet.payout)
            .bind(bet.category)
            .bind(bet.bet_id)
            .execute(&mut *tx)
            .await?;
    }

    for credit in &plan.credits {
        sqlx::query("UPDATE players SET balance = balance + $1 WHERE id = $2")
            .bind(credit.amount)
            .bind(credit.player_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO dos_ledger (player_id, kind, amount, meta) VALUES ($1, $2, $3, $4)",
        )
        .bind(credit.player_id)
        .bind(KIND_WIN)
        .bind(credit.amount)
        .bind(json!({
            "roundId": round_id,
            "bets": credit.bets,
            "categories": credit.categories,
        }))
        .execute(&mut *tx)
        .await?;
    }

    // ─────────────────────────────
    // Bank: audit events + balance write-back + round record
    // ─────────────────────────────
    sqlx::query("INSERT INTO admin_ledger (kind, amount, meta) VALUES ($1, $2, $3)")
        .bind(KIND_CARRY)
        .bind(plan.carry_out - plan.carry_in)
        .bind(json!({
            "roundId": round_id,
            "carryIn": plan.carry_in,
            "carryOut": plan.carry_out,
        }))
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO admin_ledger (kind, amount, meta) VALUES ($1, $2, $3)")
        .bind(KIND_ADMIN_TAKE)
        .bind(plan.admin_take)
        .bind(json!({ "roundId": round_id }))
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE game_bank SET carry_dos = $1, admin_balance_dos = admin_balance_dos + $2
         WHERE id = 1",
    )
    .bind(plan.carry_out)
    .bind(plan.admin_take)
    .execute(&mut *tx)
    .await?;

    let outcome_json = serde_json::to_value(outcome).map_err(anyhow::Error::new)?;
    sqlx::query("INSERT INTO round_results (round_id, outcome) VALUES ($1, $2)")
        .bind(round_id)
        .bind(&outcome_json)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        round_id,
        pot = plan.pot,
        winners = plan.credits.len(),
        total_paid = plan.total_paid,
        admin_take = plan.admin_take,
        carry_out = plan.carry_out,
        "round settled"
    );

    Ok(Json(json!({
        "ok": true,
        "alreadySettled": false,
        "roundId": round_id,
        "outcome": outcome_json,
        "pot": plan.pot,
        "adminTake": plan.admin_take,
        "winPool": plan.win_pool,
        "carryIn": plan.carry_in,
        "carryOut": plan.carry_out,
        "winners": plan.credits.len(),
        "totalPaid": plan.total_paid,
    })))
}

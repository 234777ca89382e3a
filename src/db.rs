use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;

// Player lifecycle states.
pub const STATUS_ACTIVE: &str = "ACTIVE";
pub const STATUS_SUSPENDED: &str = "SUSPENDED";

// Gift-code states.
pub const CODE_ACTIVE: &str = "ACTIVE";
pub const CODE_REDEEMED: &str = "REDEEMED";
pub const CODE_DISABLED: &str = "DISABLED";

// dos_ledger kinds. Every balance mutation writes exactly one of these
// in the same transaction, which is what keeps balance == Σ ledger.
pub const KIND_BONUS_SIGNUP: &str = "BONUS_SIGNUP";
pub const KIND_REDEEM: &str = "REDEEM";
pub const KIND_BET: &str = "BET";
pub const KIND_WIN: &str = "WIN";
pub const KIND_ADMIN_ADD: &str = "ADMIN_ADD";
pub const KIND_ADMIN_SET: &str = "ADMIN_SET";
pub const KIND_ADMIN_STATUS: &str = "ADMIN_STATUS";

// admin_ledger kinds.
pub const KIND_CARRY: &str = "CARRY";
pub const KIND_ADMIN_TAKE: &str = "ADMIN_TAKE";

/// Connects the bounded pool. SSL is disabled for local development
/// hosts and negotiated everywhere else.
pub async fn connect(database_url: &str) -> Result<PgPool> {
    let mut opts = PgConnectOptions::from_str(database_url).context("invalid DATABASE_URL")?;
    let host = opts.get_host().to_string();
    if host == "localhost" || host == "127.0.0.1" {
        opts = opts.ssl_mode(PgSslMode::Disable);
    }
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(opts)
        .await
        .context("failed to connect to postgres")
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS players (
        id BIGSERIAL PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        balance BIGINT NOT NULL DEFAULT 0 CHECK (balance >= 0),
        status TEXT NOT NULL DEFAULT 'ACTIVE',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS dos_ledger (
        id BIGSERIAL PRIMARY KEY,
        player_id BIGINT REFERENCES players(id),
        kind TEXT NOT NULL,
        amount BIGINT NOT NULL,
        meta JSONB NOT NULL DEFAULT '{}'::jsonb,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS gift_codes (
        id BIGSERIAL PRIMARY KEY,
        code_hash TEXT NOT NULL UNIQUE,
        value BIGINT NOT NULL CHECK (value > 0),
        status TEXT NOT NULL DEFAULT 'ACTIVE',
        expires_at TIMESTAMPTZ,
        redeemed_by BIGINT REFERENCES players(id),
        redeemed_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS bets (
        id BIGSERIAL PRIMARY KEY,
        player_id BIGINT NOT NULL REFERENCES players(id),
        round_id BIGINT NOT NULL,
        nums INT[] NOT NULL,
        chance INT NOT NULL,
        amount BIGINT NOT NULL CHECK (amount > 0),
        payout BIGINT NOT NULL DEFAULT 0,
        category TEXT,
        settled BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS round_results (
        round_id BIGINT PRIMARY KEY,
        outcome JSONB NOT NULL,
        settled_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS admin_ledger (
        id BIGSERIAL PRIMARY KEY,
        kind TEXT NOT NULL,
        amount BIGINT NOT NULL,
        meta JSONB NOT NULL DEFAULT '{}'::jsonb,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    // Single-row bank; its row lock serializes settlement.
    "CREATE TABLE IF NOT EXISTS game_bank (
        id SMALLINT PRIMARY KEY CHECK (id = 1),
        carry_dos BIGINT NOT NULL DEFAULT 0,
        admin_balance_dos BIGINT NOT NULL DEFAULT 0
    )",
    "INSERT INTO game_bank (id) VALUES (1) ON CONFLICT (id) DO NOTHING",
    "CREATE INDEX IF NOT EXISTS idx_bets_round ON bets (round_id)",
    "CREATE INDEX IF NOT EXISTS idx_bets_player ON bets (player_id)",
    "CREATE INDEX IF NOT EXISTS idx_ledger_player ON dos_ledger (player_id, id DESC)",
    "CREATE INDEX IF NOT EXISTS idx_gift_codes_status ON gift_codes (status)",
    "CREATE INDEX IF NOT EXISTS idx_players_leaderboard ON players (status, balance DESC)",
];

/// Idempotent DDL bootstrap, run once at startup.
pub async fn ensure_schema(pool: &PgPool) -> sqlx::Result<()> {
    for stmt in SCHEMA {
        sqlx::query(stmt).execute(pool).await?;
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRow {
    pub id: i64,
    pub username: String,
    pub balance: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRow {
    pub id: i64,
    pub player_id: Option<i64>,
    pub kind: String,
    pub amount: i64,
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// An unsettled bet as loaded (and locked) by settlement.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BetRow {
    pub id: i64,
    pub player_id: i64,
    pub round_id: i64,
    pub nums: Vec<i32>,
    pub chance: i32,
    pub amount: i64,
}

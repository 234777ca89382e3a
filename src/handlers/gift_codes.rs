use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::codes;
use crate::constants::MAX_CODES_PER_BATCH;
use crate::errors::ApiError;
use crate::handlers::require_admin;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCodesRequest {
    pub count: Option<u32>,
    pub value: i64,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Generates a batch of gift codes. Plaintext goes out exactly once in
/// the response; the table only ever holds the salted hashes.
pub async fn generate_codes_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GenerateCodesRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers)?;

    let count = req.count.unwrap_or(1);
    if count == 0 || count > MAX_CODES_PER_BATCH {
        return Err(ApiError::bad_request(format!(
            "count must be between 1 and {MAX_CODES_PER_BATCH}"
        )));
    }
    if req.value <= 0 {
        return Err(ApiError::bad_request("value must be positive"));
    }
    if let Some(expires_at) = req.expires_at {
        if expires_at <= Utc::now() {
            return Err(ApiError::bad_request("expiresAt must be in the future"));
        }
    }
    let seed = state.cfg.seed()?;

    // Pre-generate outside the transaction; thread_rng is not Send.
    let batch: Vec<(String, String)> = {
        let mut rng = rand::thread_rng();
        (0..count)
            .map(|_| {
                let code = codes::generate(&mut rng);
                let hash = codes::code_hash(seed, &code);
                (code, hash)
            })
            .collect()
    };

    let mut tx = state.db.begin().await?;
    for (_, hash) in &batch {
        sqlx::query("INSERT INTO gift_codes (code_hash, value, expires_at) VALUES ($1, $2, $3)")
            .bind(hash)
            .bind(req.value)
            .bind(req.expires_at)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    let plaintext: Vec<&str> = batch.iter().map(|(code, _)| code.as_str()).collect();
    tracing::info!(count, value = req.value, "gift codes generated");

    Ok(Json(json!({
        "ok": true,
        "value": req.value,
        "expiresAt": req.expires_at,
        "codes": plaintext,
    })))
}

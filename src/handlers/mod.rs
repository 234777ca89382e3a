//! One file per HTTP operation.

pub mod bet_place;
pub mod config_admin;
pub mod gift_codes;
pub mod player_admin;
pub mod queries;
pub mod redeem;
pub mod settle_round;
pub mod signup;

use axum::http::HeaderMap;

use crate::errors::ApiError;
use crate::state::AppState;

/// Admin gate: the `x-admin-key` header must equal the configured key.
pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let presented = headers.get("x-admin-key").and_then(|v| v.to_str().ok());
    if presented == Some(state.cfg.admin_key.as_str()) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

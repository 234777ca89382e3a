use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::draw::DrawError;
use crate::settle::SettleError;

/// Error taxonomy for every operation. Handlers return
/// `Result<Json<_>, ApiError>`; the transport mapping lives here so no
/// handler matches on strings or raw status codes.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // ─────────────────────────────
    // Input validation
    // ─────────────────────────────
    #[error("{0}")]
    BadRequest(String),

    // ─────────────────────────────
    // Access control
    // ─────────────────────────────
    /// Missing/invalid admin key, or acting on a non-ACTIVE player.
    #[error("Forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    // ─────────────────────────────
    // State conflicts
    // ─────────────────────────────
    /// Bets closed, insufficient balance, used code, round not ended, etc.
    /// `details` is merged into the error body for client diagnostics.
    #[error("{message}")]
    Conflict {
        message: String,
        details: Option<Value>,
    },

    #[error("too many requests")]
    TooManyRequests { retry_after_secs: u64 },

    /// Environment misconfiguration (seed missing/short). Not recoverable
    /// by the client.
    #[error("{0}")]
    Config(String),

    #[error("internal error")]
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict {
            message: message.into(),
            details: None,
        }
    }

    pub fn conflict_with(message: impl Into<String>, details: Value) -> Self {
        ApiError::Conflict {
            message: message.into(),
            details: Some(details),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Config(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Internal(anyhow::Error::new(err))
    }
}

impl From<DrawError> for ApiError {
    fn from(err: DrawError) -> Self {
        ApiError::Config(err.to_string())
    }
}

impl From<SettleError> for ApiError {
    fn from(err: SettleError) -> Self {
        ApiError::Internal(anyhow::Error::new(err))
    }
}

/// True when `err` is a Postgres unique-constraint violation (SQLSTATE 23505).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "request failed");
        }

        let mut body = json!({ "error": self.to_string() });
        if let ApiError::Conflict {
            details: Some(details),
            ..
        } = &self
        {
            if let (Some(obj), Some(extra)) = (body.as_object_mut(), details.as_object()) {
                for (key, value) in extra {
                    obj.insert(key.clone(), value.clone());
                }
            }
        }

        let mut response = (status, Json(body)).into_response();
        if let ApiError::TooManyRequests { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_the_contract() {
        assert_eq!(
            ApiError::bad_request("x").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound("player").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("bets closed").status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::TooManyRequests {
                retry_after_secs: 10
            }
            .status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::Config("seed".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_names_the_entity() {
        assert_eq!(ApiError::NotFound("gift code").to_string(), "gift code not found");
    }

    #[test]
    fn conflict_details_do_not_change_the_message() {
        let err = ApiError::conflict_with("bets closed", json!({"roundId": 7}));
        assert_eq!(err.to_string(), "bets closed");
    }
}

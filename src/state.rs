use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::config::AppConfig;
use crate::ratelimit::RateLimiter;
use crate::round::TimingParams;

/// Shared application state; cheap to clone into every handler.
/// Durable state lives in Postgres — the only in-process mutables are
/// the timing snapshot and the rate-limit map.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<AppConfig>,
    pub db: PgPool,
    timing: Arc<RwLock<TimingParams>>,
    pub redeem_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(cfg: AppConfig, db: PgPool) -> Self {
        let timing = cfg.timing;
        Self {
            cfg: Arc::new(cfg),
            db,
            timing: Arc::new(RwLock::new(timing)),
            redeem_limiter: Arc::new(RateLimiter::redeem_default()),
        }
    }

    /// One consistent snapshot per request; never read fields piecemeal.
    pub async fn timing(&self) -> TimingParams {
        *self.timing.read().await
    }

    /// Atomically replaces the snapshot. Takes effect for new requests.
    pub async fn set_timing(&self, params: TimingParams) {
        *self.timing.write().await = params;
    }
}

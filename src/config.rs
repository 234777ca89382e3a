use anyhow::{Context, Result};

use crate::constants::{
    DEFAULT_ANCHOR_MS, DEFAULT_CLOSE_BETS_AT, DEFAULT_PORT, DEFAULT_ROUND_SECONDS,
    DEFAULT_SIGNUP_BONUS_DOS, MIN_SEED_LEN,
};
use crate::errors::ApiError;
use crate::round::TimingParams;

/// Process configuration, read once at startup. Timing parameters are the
/// initial values only; the live copy sits behind the state snapshot and
/// is mutable through the admin config endpoint.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub admin_key: String,
    pub database_url: String,
    pub secret_seed: Option<String>,
    pub signup_bonus_dos: i64,
    pub timing: TimingParams,
}

fn env_i64(name: &str, default: i64) -> Result<i64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<i64>()
            .with_context(|| format!("{name} must be an integer, got {raw:?}")),
        Err(_) => Ok(default),
    }
}

pub fn load_config() -> Result<AppConfig> {
    let port = match std::env::var("PORT") {
        Ok(raw) => raw
            .trim()
            .parse::<u16>()
            .with_context(|| format!("PORT must be a port number, got {raw:?}"))?,
        Err(_) => DEFAULT_PORT,
    };

    let admin_key = std::env::var("ADMIN_KEY").context("ADMIN_KEY must be set")?;
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    // The seed is allowed to be absent at boot: only settlement, redemption
    // and code generation require it, and they fail with ConfigError.
    let secret_seed = std::env::var("SECRET_SEED").ok().filter(|s| !s.is_empty());

    let timing = TimingParams {
        round_seconds: env_i64("ROUND_SECONDS", DEFAULT_ROUND_SECONDS)?,
        close_bets_at: env_i64("CLOSE_BETS_AT", DEFAULT_CLOSE_BETS_AT)?,
        anchor_ms: env_i64("ANCHOR_MS", DEFAULT_ANCHOR_MS)?,
    }
    .sanitize();

    Ok(AppConfig {
        port,
        admin_key,
        database_url,
        secret_seed,
        signup_bonus_dos: env_i64("SIGNUP_BONUS_DOS", DEFAULT_SIGNUP_BONUS_DOS)?.max(0),
        timing,
    })
}

impl AppConfig {
    /// Seed gate shared by the draw, redemption and code generation.
    pub fn seed(&self) -> Result<&str, ApiError> {
        match self.secret_seed.as_deref() {
            Some(seed) if seed.len() >= MIN_SEED_LEN => Ok(seed),
            Some(_) => Err(ApiError::Config(format!(
                "SECRET_SEED must be at least {MIN_SEED_LEN} characters"
            ))),
            None => Err(ApiError::Config("SECRET_SEED is not set".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_seed(seed: Option<&str>) -> AppConfig {
        AppConfig {
            port: DEFAULT_PORT,
            admin_key: "k".into(),
            database_url: "postgres://localhost/ddj".into(),
            secret_seed: seed.map(str::to_string),
            signup_bonus_dos: DEFAULT_SIGNUP_BONUS_DOS,
            timing: TimingParams {
                round_seconds: DEFAULT_ROUND_SECONDS,
                close_bets_at: DEFAULT_CLOSE_BETS_AT,
                anchor_ms: DEFAULT_ANCHOR_MS,
            },
        }
    }

    #[test]
    fn seed_requires_sixteen_characters() {
        assert!(config_with_seed(None).seed().is_err());
        assert!(config_with_seed(Some("short")).seed().is_err());
        assert_eq!(
            config_with_seed(Some("0123456789abcdef")).seed().ok(),
            Some("0123456789abcdef")
        );
    }
}

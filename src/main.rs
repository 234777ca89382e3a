use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

use ddj::config::load_config;
use ddj::handlers;
use ddj::ratelimit;
use ddj::state::AppState;
use ddj::{db, round};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = load_config()?;
    let pool = db::connect(&cfg.database_url).await?;
    db::ensure_schema(&pool).await.context("schema bootstrap failed")?;

    let port = cfg.port;
    let state = AppState::new(cfg, pool);
    ratelimit::spawn_sweeper(state.redeem_limiter.clone());

    let app = Router::new()
        .route("/api/health", get(handlers::queries::health))
        .route("/api/round", get(handlers::queries::round_snapshot))
        .route("/api/player/signup", post(handlers::signup::signup_handler))
        .route("/api/player/redeem", post(handlers::redeem::redeem_handler))
        .route("/api/player/{id}/ledger", get(handlers::queries::player_ledger))
        .route("/api/bet", post(handlers::bet_place::place_bet_handler))
        .route("/api/leaderboard", get(handlers::queries::leaderboard))
        .route(
            "/api/admin/config",
            get(handlers::config_admin::get_config_handler)
                .put(handlers::config_admin::update_config_handler),
        )
        .route(
            "/api/admin/gift-codes",
            post(handlers::gift_codes::generate_codes_handler),
        )
        .route(
            "/api/admin/settle",
            post(handlers::settle_round::settle_round_handler),
        )
        .route(
            "/api/admin/player/{id}/adjust",
            post(handlers::player_admin::adjust_player_handler),
        )
        .route("/api/admin/bank", get(handlers::queries::bank_snapshot))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state.clone());

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let info = round::round_info(state.timing().await, round::now_ms());
    tracing::info!(%addr, round_id = info.round_id, "ddj listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

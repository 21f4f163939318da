mod admin;
mod auth_middleware;
mod database;
mod intake;
mod ledger;
mod metrics;
mod middleware;
mod scheduler;
mod selector;
mod state;
mod types;
mod utils;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::FixedOffset;
use serde_json::{json, Value};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::database::constants::DEFAULT_DB_PATH;
use crate::database::path::validate_db_path;
use crate::database::Database;
use crate::scheduler::{spawn_timer, DailyScheduler, SchedulerConfig};
use crate::state::AppState;
use crate::utils::{env_parse, parse_hhmm};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Daily Lottery Service");

    let db_path = std::env::var("DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
    validate_db_path(&db_path)?;
    let db = Database::connect(&db_path).await?;

    // The firing instant and its offset are configuration, never hardcoded.
    let selection_time = std::env::var("SELECTION_TIME").unwrap_or_else(|_| "23:59".to_string());
    let fire_at = parse_hhmm(&selection_time)
        .ok_or_else(|| anyhow::anyhow!("SELECTION_TIME must be HH:MM, got '{}'", selection_time))?;
    let offset_minutes: i32 = env_parse("SELECTION_UTC_OFFSET_MINUTES", 0);
    let utc_offset = FixedOffset::east_opt(offset_minutes * 60).ok_or_else(|| {
        anyhow::anyhow!("SELECTION_UTC_OFFSET_MINUTES out of range: {}", offset_minutes)
    })?;

    let config = SchedulerConfig {
        fire_at,
        utc_offset,
        ledger_timeout: Duration::from_millis(env_parse("LEDGER_TIMEOUT_MS", 5000u64)),
        rng_seed: std::env::var("RNG_SEED").ok().and_then(|v| v.parse().ok()),
    };
    let scheduler = Arc::new(DailyScheduler::new(Arc::new(db.clone()), config));
    let runner = spawn_timer(scheduler.clone());

    let admin_token = std::env::var("ADMIN_AUTH_TOKEN").ok();
    if admin_token.is_none() {
        warn!("ADMIN_AUTH_TOKEN not set; admin endpoints will reject all requests");
    }

    let app_state = AppState {
        db,
        scheduler,
        utc_offset,
        admin_token,
    };

    // Rate limit on ballot submission, keyed by the normalized client IP.
    // RATE_LIMIT_REPLENISH_MS=0 disables the limiter (integration tests).
    let mut ballot_routes = Router::new().route("/ballots", post(intake::submit_ballot));
    let replenish_ms: u64 = env_parse("RATE_LIMIT_REPLENISH_MS", 200);
    let burst: u32 = env_parse("RATE_LIMIT_BURST", 20);
    if replenish_ms > 0 {
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_millisecond(replenish_ms)
                .burst_size(burst)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .ok_or_else(|| anyhow::anyhow!("invalid rate limit configuration"))?,
        );
        ballot_routes = ballot_routes.route_layer(GovernorLayer {
            config: governor_conf,
        });
    }

    let admin_routes = Router::new()
        .route("/lotteries", post(admin::create_lottery))
        .route("/trigger", post(admin::trigger_cycle))
        .route("/cycle", get(admin::cycle_status))
        .route("/stats", get(admin::stats))
        .route_layer(from_fn_with_state(
            app_state.clone(),
            auth_middleware::admin_auth,
        ));

    let app = Router::new()
        .route("/healthz", get(health_check))
        .route("/version", get(version))
        .route("/lotteries", get(intake::list_lotteries))
        .route("/winners", get(intake::list_winners))
        .route("/users", post(intake::register_user))
        .merge(ballot_routes)
        .nest("/admin", admin_routes)
        .layer(from_fn(middleware::inject_client_ip))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let port: u16 = env_parse("PORT", 3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    runner.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}

// Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

// Build stamp from build.rs
async fn version() -> Json<Value> {
    Json(json!({
        "git_hash": option_env!("LOTTERY_BUILD_GIT_HASH"),
        "built_at_unix": option_env!("LOTTERY_BUILD_TIME_UNIX"),
    }))
}

//! Admin surface: lottery creation, cycle control, stats

use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::database::models::Lottery;
use crate::metrics;
use crate::state::AppState;
use crate::types::CreateLotteryRequest;

/// Handle POST /admin/lotteries - administrative lottery creation
pub async fn create_lottery(
    State(state): State<AppState>,
    Json(req): Json<CreateLotteryRequest>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    info!("POST /admin/lotteries - '{}' due {}", req.name, req.due_date);

    let name = req.name.trim();
    if name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    match Lottery::insert(state.db.pool(), name, req.due_date).await {
        Ok(Some(lottery)) => Ok((StatusCode::CREATED, Json(json!(lottery)))),
        Ok(None) => Err(StatusCode::CONFLICT),
        Err(err) => {
            error!("Creating lottery failed: {}", err);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /admin/trigger - run a selection cycle immediately, bypassing
/// the timer, and return its report.
pub async fn trigger_cycle(State(state): State<AppState>) -> Json<Value> {
    info!("POST /admin/trigger - forcing a selection cycle");
    let report = state.scheduler.trigger_now().await;
    Json(json!(report))
}

/// Handle GET /admin/cycle - scheduler state plus the last cycle report
pub async fn cycle_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "state": state.scheduler.state(),
        "last_cycle": state.scheduler.last_cycle(),
    }))
}

/// Handle GET /admin/stats - metrics snapshot
pub async fn stats() -> Json<Value> {
    Json(metrics::snapshot_as_json())
}

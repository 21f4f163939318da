//! Ballot intake and public read endpoints

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::database::models::views::LotteryOverview;
use crate::database::models::{Ballot, Lottery, User, WinnerRecord};
use crate::metrics::{self, BallotOutcome};
use crate::state::AppState;
use crate::types::{LotteriesQuery, RegisterUserRequest, SubmitBallotRequest, WinnersQuery};

/// Handle POST /ballots
pub async fn submit_ballot(
    State(state): State<AppState>,
    Json(req): Json<SubmitBallotRequest>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let today = state.today();
    info!(
        "POST /ballots - lottery '{}' user {:?}",
        req.lottery_name, req.user_id
    );

    let lottery = Lottery::find_by_name(state.db.pool(), &req.lottery_name)
        .await
        .map_err(internal)?;
    let Some(lottery) = lottery else {
        metrics::record_ballot_outcome(BallotOutcome::LotteryNotFound);
        info!("Ballot rejected: unknown lottery '{}'", req.lottery_name);
        return Err(StatusCode::NOT_FOUND);
    };

    if lottery.due_date < today {
        metrics::record_ballot_outcome(BallotOutcome::LotteryClosed);
        info!(
            "Ballot rejected: lottery '{}' closed on {}",
            lottery.name, lottery.due_date
        );
        return Err(StatusCode::GONE);
    }

    if let Some(user_id) = req.user_id {
        let known = User::find_by_id(state.db.pool(), user_id)
            .await
            .map_err(internal)?;
        if known.is_none() {
            metrics::record_ballot_outcome(BallotOutcome::UserNotFound);
            info!("Ballot rejected: unknown user {}", user_id);
            return Err(StatusCode::BAD_REQUEST);
        }
    }

    let ballot = Ballot::insert(state.db.pool(), lottery.id, req.user_id, today)
        .await
        .map_err(internal)?;
    metrics::record_ballot_outcome(BallotOutcome::Accepted);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "ballot_id": ballot.id,
            "lottery_id": ballot.lottery_id,
            "submission_date": ballot.submission_date,
        })),
    ))
}

/// Handle GET /lotteries - active lotteries, with the caller's per-lottery
/// ballot counts when user_id is supplied.
pub async fn list_lotteries(
    State(state): State<AppState>,
    Query(query): Query<LotteriesQuery>,
) -> Result<Json<Value>, StatusCode> {
    let today = state.today();
    let lotteries = Lottery::list_active(state.db.pool(), today)
        .await
        .map_err(internal)?;

    // The caller's ballot counts come from one grouped query; lotteries the
    // user never entered show a count of zero.
    let counts: HashMap<i64, i64> = match query.user_id {
        Some(user_id) => Ballot::counts_for_user(state.db.pool(), user_id)
            .await
            .map_err(internal)?
            .into_iter()
            .collect(),
        None => HashMap::new(),
    };

    let overview: Vec<LotteryOverview> = lotteries
        .iter()
        .map(|lottery| LotteryOverview {
            lottery_name: lottery.name.clone(),
            due_date: lottery.due_date,
            ballot_count: query
                .user_id
                .map(|_| counts.get(&lottery.id).copied().unwrap_or(0)),
        })
        .collect();

    Ok(Json(json!({ "date": today, "lotteries": overview })))
}

/// Handle GET /winners - winner records for a date (default today)
pub async fn list_winners(
    State(state): State<AppState>,
    Query(query): Query<WinnersQuery>,
) -> Result<Json<Value>, StatusCode> {
    let date = query.date.unwrap_or_else(|| state.today());
    let winners = WinnerRecord::list_on(state.db.pool(), date)
        .await
        .map_err(internal)?;

    Ok(Json(json!({ "date": date, "winners": winners })))
}

/// Handle POST /users - identity registration (no credentials; auth is out
/// of scope for this service)
pub async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    match User::insert(state.db.pool(), username)
        .await
        .map_err(internal)?
    {
        Some(user) => Ok((
            StatusCode::CREATED,
            Json(json!({ "user_id": user.id, "username": user.username })),
        )),
        None => {
            info!("Registration rejected: username '{}' taken", username);
            Err(StatusCode::CONFLICT)
        }
    }
}

fn internal<E: std::fmt::Display>(err: E) -> StatusCode {
    error!("storage error: {}", err);
    StatusCode::INTERNAL_SERVER_ERROR
}

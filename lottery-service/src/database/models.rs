pub mod views;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A named lottery accepting ballots through its due date (inclusive).
/// Immutable once created; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lottery {
    pub id: i64,
    pub name: String,
    pub due_date: NaiveDate,
    pub created_at: String, // ISO8601 UTC timestamp
}

/// Registered identity. The selection core only ever sees the id and a
/// username snapshot; authentication lives outside this service.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub created_at: String, // ISO8601 UTC timestamp
}

/// One entry submitted into a lottery on a given day. A user may hold any
/// number of ballots per lottery per day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ballot {
    pub id: i64,
    pub lottery_id: i64,
    pub user_id: Option<i64>,
    pub submission_date: NaiveDate,
}

/// Durable, immutable proof of a selection outcome. Lottery and user names
/// are denormalized snapshots taken at selection time.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WinnerRecord {
    pub id: i64,
    pub lottery_id: i64,
    pub lottery_name: String,
    pub user_name: String,
    pub ballot_id: i64,
    pub selection_date: NaiveDate,
}

/// Winner row as assembled by the scheduler, before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewWinner {
    pub lottery_id: i64,
    pub lottery_name: String,
    pub user_name: String,
    pub ballot_id: i64,
    pub selection_date: NaiveDate,
}

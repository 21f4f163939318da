use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use super::models::*;
use crate::ledger::RecordOutcome;

/// Database operations for lotteries
impl Lottery {
    /// Insert a new lottery. Returns None when the name is already taken.
    pub async fn insert(
        pool: &SqlitePool,
        name: &str,
        due_date: NaiveDate,
    ) -> Result<Option<Lottery>, sqlx::Error> {
        debug!("Inserting lottery '{}' due {}", name, due_date);

        sqlx::query_as::<_, Lottery>(
            "INSERT INTO lotteries (name, due_date, created_at) VALUES (?, ?, ?) \
             ON CONFLICT(name) DO NOTHING \
             RETURNING id, name, due_date, created_at",
        )
        .bind(name)
        .bind(due_date)
        .bind(Utc::now().to_rfc3339())
        .fetch_optional(pool)
        .await
    }

    /// Lotteries still accepting ballots as of `as_of` (due date inclusive)
    pub async fn list_active(
        pool: &SqlitePool,
        as_of: NaiveDate,
    ) -> Result<Vec<Lottery>, sqlx::Error> {
        sqlx::query_as::<_, Lottery>(
            "SELECT id, name, due_date, created_at FROM lotteries \
             WHERE due_date >= ? ORDER BY id",
        )
        .bind(as_of)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_name(
        pool: &SqlitePool,
        name: &str,
    ) -> Result<Option<Lottery>, sqlx::Error> {
        sqlx::query_as::<_, Lottery>(
            "SELECT id, name, due_date, created_at FROM lotteries WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(pool)
        .await
    }

    pub async fn name_of(pool: &SqlitePool, id: i64) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT name FROM lotteries WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}

/// Database operations for users
impl User {
    /// Insert a new user. Returns None when the username is already taken.
    pub async fn insert(pool: &SqlitePool, username: &str) -> Result<Option<User>, sqlx::Error> {
        debug!("Inserting user '{}'", username);

        sqlx::query_as::<_, User>(
            "INSERT INTO users (username, created_at) VALUES (?, ?) \
             ON CONFLICT(username) DO NOTHING \
             RETURNING id, username, created_at",
        )
        .bind(username)
        .bind(Utc::now().to_rfc3339())
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT id, username, created_at FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn name_of(pool: &SqlitePool, id: i64) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT username FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}

/// Database operations for ballots
impl Ballot {
    pub async fn insert(
        pool: &SqlitePool,
        lottery_id: i64,
        user_id: Option<i64>,
        submission_date: NaiveDate,
    ) -> Result<Ballot, sqlx::Error> {
        debug!(
            "Inserting ballot for lottery {} on {}",
            lottery_id, submission_date
        );

        sqlx::query_as::<_, Ballot>(
            "INSERT INTO ballots (lottery_id, user_id, submission_date) VALUES (?, ?, ?) \
             RETURNING id, lottery_id, user_id, submission_date",
        )
        .bind(lottery_id)
        .bind(user_id)
        .bind(submission_date)
        .fetch_one(pool)
        .await
    }

    /// The day's ballots across a set of lotteries, in one statement. A
    /// ballot submitted while this runs is either fully in or fully out.
    pub async fn list_on(
        pool: &SqlitePool,
        lottery_ids: &[i64],
        on: NaiveDate,
    ) -> Result<Vec<Ballot>, sqlx::Error> {
        if lottery_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = lottery_ids
            .iter()
            .map(|_| "?")
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT id, lottery_id, user_id, submission_date FROM ballots \
             WHERE submission_date = ? AND lottery_id IN ({placeholders}) ORDER BY id"
        );

        let mut query = sqlx::query_as::<_, Ballot>(&sql).bind(on);
        for id in lottery_ids {
            query = query.bind(id);
        }
        query.fetch_all(pool).await
    }

    /// The user's ballot counts per lottery, across all days, in one
    /// grouped statement.
    pub async fn counts_for_user(
        pool: &SqlitePool,
        user_id: i64,
    ) -> Result<Vec<(i64, i64)>, sqlx::Error> {
        sqlx::query_as::<_, (i64, i64)>(
            "SELECT lottery_id, COUNT(*) FROM ballots WHERE user_id = ? GROUP BY lottery_id",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}

/// Database operations for winner records
impl WinnerRecord {
    /// Insert a winner for (lottery, date). The UNIQUE constraint plus
    /// ON CONFLICT DO NOTHING make this atomic under concurrency: exactly
    /// one caller inserts, every other observes `AlreadyRecorded`.
    pub async fn insert_new(
        pool: &SqlitePool,
        winner: &NewWinner,
    ) -> Result<RecordOutcome, sqlx::Error> {
        debug!(
            "Recording winner ballot {} for lottery {} on {}",
            winner.ballot_id, winner.lottery_id, winner.selection_date
        );

        let inserted = sqlx::query_as::<_, WinnerRecord>(
            "INSERT INTO winners (lottery_id, lottery_name, user_name, ballot_id, selection_date) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(lottery_id, selection_date) DO NOTHING \
             RETURNING id, lottery_id, lottery_name, user_name, ballot_id, selection_date",
        )
        .bind(winner.lottery_id)
        .bind(&winner.lottery_name)
        .bind(&winner.user_name)
        .bind(winner.ballot_id)
        .bind(winner.selection_date)
        .fetch_optional(pool)
        .await?;

        match inserted {
            Some(record) => Ok(RecordOutcome::Recorded(record)),
            None => Ok(RecordOutcome::AlreadyRecorded),
        }
    }

    pub async fn find_for(
        pool: &SqlitePool,
        lottery_id: i64,
        on: NaiveDate,
    ) -> Result<Option<WinnerRecord>, sqlx::Error> {
        sqlx::query_as::<_, WinnerRecord>(
            "SELECT id, lottery_id, lottery_name, user_name, ballot_id, selection_date \
             FROM winners WHERE lottery_id = ? AND selection_date = ?",
        )
        .bind(lottery_id)
        .bind(on)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_on(
        pool: &SqlitePool,
        on: NaiveDate,
    ) -> Result<Vec<WinnerRecord>, sqlx::Error> {
        sqlx::query_as::<_, WinnerRecord>(
            "SELECT id, lottery_id, lottery_name, user_name, ballot_id, selection_date \
             FROM winners WHERE selection_date = ? ORDER BY lottery_id",
        )
        .bind(on)
        .fetch_all(pool)
        .await
    }
}

//! Scheduler-facing storage contract.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::database::models::{Ballot, Lottery, NewWinner, WinnerRecord};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
    #[error("ledger call timed out")]
    Timeout,
}

/// Outcome of a winner insert. `AlreadyRecorded` is the idempotency signal,
/// not an error: a record for that (lottery, date) survived an earlier cycle.
#[derive(Debug)]
pub enum RecordOutcome {
    Recorded(WinnerRecord),
    AlreadyRecorded,
}

/// Durable-store operations the selection cycle depends on. Reads have no
/// side effects; the only durable write is `record_winner`.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Lotteries whose due date (inclusive) has not passed as of `as_of`.
    async fn list_active_lotteries(&self, as_of: NaiveDate) -> Result<Vec<Lottery>, LedgerError>;

    /// Ballots submitted on `on` against any of `lottery_ids`, read in a
    /// single statement so the day's pool is one consistent snapshot.
    async fn list_ballots_on(
        &self,
        lottery_ids: &[i64],
        on: NaiveDate,
    ) -> Result<Vec<Ballot>, LedgerError>;

    async fn lookup_lottery_name(&self, id: i64) -> Result<Option<String>, LedgerError>;

    async fn lookup_user_name(&self, id: i64) -> Result<Option<String>, LedgerError>;

    /// Durably record a winner. Atomic per (lottery_id, selection_date):
    /// concurrent or replayed calls never produce a duplicate row, the loser
    /// observes `AlreadyRecorded` instead of a uniqueness fault.
    async fn record_winner(&self, winner: NewWinner) -> Result<RecordOutcome, LedgerError>;

    /// The surviving record for a (lottery, date) pair, if any.
    async fn winner_for(
        &self,
        lottery_id: i64,
        on: NaiveDate,
    ) -> Result<Option<WinnerRecord>, LedgerError>;
}

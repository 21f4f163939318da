pub mod constants;
pub mod migrator;
pub mod models;
pub mod operations;
pub mod path;
pub mod sql;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::ledger::{Ledger, LedgerError, RecordOutcome};
use models::{Ballot, Lottery, NewWinner, User, WinnerRecord};

pub use migrator::run_migrations;

/// Handle on the durable store. Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database and run migrations.
    pub async fn connect(db_path: &str) -> Result<Self, LedgerError> {
        info!("Initializing database at {:?}", db_path);

        // An in-memory database exists per connection, so it gets a pool of
        // one; files use WAL so intake writes and cycle reads interleave.
        let memory = db_path == ":memory:";
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(if memory {
                SqliteJournalMode::Memory
            } else {
                SqliteJournalMode::Wal
            });

        let pool = SqlitePoolOptions::new()
            .max_connections(if memory { 1 } else { 8 })
            .connect_with(options)
            .await?;

        run_migrations(&pool).await?;

        info!("Database initialized successfully");

        Ok(Database { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Ledger for Database {
    async fn list_active_lotteries(&self, as_of: NaiveDate) -> Result<Vec<Lottery>, LedgerError> {
        Ok(Lottery::list_active(&self.pool, as_of).await?)
    }

    async fn list_ballots_on(
        &self,
        lottery_ids: &[i64],
        on: NaiveDate,
    ) -> Result<Vec<Ballot>, LedgerError> {
        Ok(Ballot::list_on(&self.pool, lottery_ids, on).await?)
    }

    async fn lookup_lottery_name(&self, id: i64) -> Result<Option<String>, LedgerError> {
        Ok(Lottery::name_of(&self.pool, id).await?)
    }

    async fn lookup_user_name(&self, id: i64) -> Result<Option<String>, LedgerError> {
        Ok(User::name_of(&self.pool, id).await?)
    }

    async fn record_winner(&self, winner: NewWinner) -> Result<RecordOutcome, LedgerError> {
        Ok(WinnerRecord::insert_new(&self.pool, &winner).await?)
    }

    async fn winner_for(
        &self,
        lottery_id: i64,
        on: NaiveDate,
    ) -> Result<Option<WinnerRecord>, LedgerError> {
        Ok(WinnerRecord::find_for(&self.pool, lottery_id, on).await?)
    }
}

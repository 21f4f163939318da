//! Shared application state

use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate, Utc};

use crate::database::Database;
use crate::scheduler::DailyScheduler;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub scheduler: Arc<DailyScheduler>,
    /// Intake dates use the same offset the scheduler fires in, so "today"
    /// means the same thing on both sides of the ledger.
    pub utc_offset: FixedOffset,
    /// Bearer token for the admin surface; None closes it entirely.
    pub admin_token: Option<String>,
}

impl AppState {
    /// Today's date in the configured offset.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.utc_offset).date_naive()
    }
}

//! API response view models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Active lottery as shown on the public list, with the caller's ballot
/// count when a user id was supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotteryOverview {
    pub lottery_name: String,
    pub due_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ballot_count: Option<i64>,
}

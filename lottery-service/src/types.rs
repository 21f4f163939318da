//! Types for HTTP requests and responses

use chrono::NaiveDate;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SubmitBallotRequest {
    pub lottery_name: String,
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateLotteryRequest {
    pub name: String,
    pub due_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct LotteriesQuery {
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct WinnersQuery {
    pub date: Option<NaiveDate>,
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CheckIn {
    pub id: Uuid,
    pub member_id: Uuid,
    pub checked_in_at: DateTime<Utc>,
    pub checked_out_at: Option<DateTime<Utc>>,
    pub recorded_by: Option<Uuid>,
}

/// Open check-in joined with the member's name
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActiveCheckIn {
    pub id: Uuid,
    pub member_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub checked_in_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    pub member_id: Uuid,
}

/// Consistency outcome for the week containing a check-in
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsistencyResult {
    pub week_start: NaiveDate,
    pub days_this_week: i64,
    pub required_days: u32,
    pub points_awarded: i64,
}

#[derive(Debug, Serialize)]
pub struct CheckInResponse {
    pub check_in: CheckIn,
    pub consistency: ConsistencyResult,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeeklyConsistency {
    pub week_start: NaiveDate,
    pub days_checked_in: i64,
    pub qualified: bool,
    pub points_awarded: i64,
}

#[derive(Debug, Serialize)]
pub struct ConsistencyReport {
    pub member_id: Uuid,
    pub required_days: u32,
    pub weeks: Vec<WeeklyConsistency>,
}

#[derive(Debug, Deserialize)]
pub struct ConsistencyQuery {
    pub weeks: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

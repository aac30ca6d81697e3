use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::validation::validate_text;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "loyalty_transaction_type", rename_all = "snake_case")]
pub enum LoyaltyTransactionType {
    Earned,
    Redeemed,
    Adjusted,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LoyaltyTransaction {
    pub id: Uuid,
    pub member_id: Uuid,
    pub points: i64,
    pub transaction_type: LoyaltyTransactionType,
    pub reason: String,
    pub reference_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LoyaltySummary {
    pub member_id: Uuid,
    pub balance: i64,
    pub recent_transactions: Vec<LoyaltyTransaction>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustPointsRequest {
    pub member_id: Uuid,
    pub points: i64,
    pub reason: String,
}

impl AdjustPointsRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.points == 0 {
            return Err(AppError::validation("Adjustment must be non-zero"));
        }
        validate_text("reason", &self.reason, 500)
    }
}

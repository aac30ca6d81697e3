use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::training_session::SessionStatus;
use crate::models::validation::{
    validate_day_of_week, validate_optional_text, validate_price, validate_range,
    validate_text,
};

pub const MIN_SESSION_MINUTES: i32 = 15;
pub const MAX_SESSION_MINUTES: i32 = 240;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MonthlyPlan {
    pub id: Uuid,
    pub trainer_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub sessions_per_month: i32,
    pub session_duration_minutes: i32,
    pub price_cents: i64,
    pub max_subscribers: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing row: plan plus trainer name and active subscriber count
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MonthlyPlanSummary {
    pub id: Uuid,
    pub trainer_id: Uuid,
    pub trainer_name: String,
    pub name: String,
    pub description: Option<String>,
    pub sessions_per_month: i32,
    pub session_duration_minutes: i32,
    pub price_cents: i64,
    pub max_subscribers: i32,
    pub active_subscribers: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlanScheduleEntry {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
}

#[derive(Debug, Serialize)]
pub struct MonthlyPlanDetail {
    #[serde(flatten)]
    pub plan: MonthlyPlanSummary,
    pub schedule: Vec<PlanScheduleEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct PlanScheduleRequest {
    pub day_of_week: i16,
    pub start_time: NaiveTime,
}

#[derive(Debug, Deserialize)]
pub struct CreateMonthlyPlanRequest {
    pub name: String,
    pub description: Option<String>,
    pub sessions_per_month: i32,
    pub session_duration_minutes: i32,
    pub price_cents: i64,
    pub max_subscribers: i32,
    pub schedule: Vec<PlanScheduleRequest>,
}

impl CreateMonthlyPlanRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_text("name", &self.name, 100)?;
        validate_optional_text("description", self.description.as_deref(), 2000)?;
        validate_range("sessions_per_month", self.sessions_per_month, 1, 62)?;
        validate_range(
            "session_duration_minutes",
            self.session_duration_minutes,
            MIN_SESSION_MINUTES,
            MAX_SESSION_MINUTES,
        )?;
        validate_price("price_cents", self.price_cents)?;
        validate_range("max_subscribers", self.max_subscribers, 1, 500)?;

        if self.schedule.is_empty() {
            return Err(AppError::validation("Plan schedule cannot be empty"));
        }

        let mut seen = HashSet::new();
        for entry in &self.schedule {
            validate_day_of_week(entry.day_of_week)?;
            if !seen.insert(*entry) {
                return Err(AppError::validation(format!(
                    "Duplicate schedule entry: day {} at {}",
                    entry.day_of_week, entry.start_time
                )));
            }
            if crosses_midnight(entry.start_time, self.session_duration_minutes) {
                return Err(AppError::validation(format!(
                    "Session starting at {} would run past midnight",
                    entry.start_time
                )));
            }
        }

        Ok(())
    }
}

/// True if `[start, start + minutes)` does not end on the same day
pub fn crosses_midnight(start: NaiveTime, minutes: i32) -> bool {
    let (_, wrapped_secs) = start.overflowing_add_signed(Duration::minutes(minutes as i64));
    wrapped_secs != 0
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMonthlyPlanRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub sessions_per_month: Option<i32>,
    pub price_cents: Option<i64>,
    pub max_subscribers: Option<i32>,
    pub is_active: Option<bool>,
}

impl UpdateMonthlyPlanRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_optional_text("name", self.name.as_deref(), 100)?;
        validate_optional_text("description", self.description.as_deref(), 2000)?;
        if let Some(sessions) = self.sessions_per_month {
            validate_range("sessions_per_month", sessions, 1, 62)?;
        }
        if let Some(price) = self.price_cents {
            validate_price("price_cents", price)?;
        }
        if let Some(max) = self.max_subscribers {
            validate_range("max_subscribers", max, 1, 500)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Rejected,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub member_id: Uuid,
    pub status: SubscriptionStatus,
    pub requested_start: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Subscription joined with plan and member names
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubscriptionSummary {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub plan_name: String,
    pub trainer_id: Uuid,
    pub member_id: Uuid,
    pub member_name: String,
    pub status: SubscriptionStatus,
    pub requested_start: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscribeRequest {
    pub requested_start: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MonthlyPlanSlot {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub plan_id: Uuid,
    pub trainer_id: Uuid,
    pub member_id: Uuid,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionWithSlots {
    #[serde(flatten)]
    pub subscription: SubscriptionSummary,
    pub slots: Vec<MonthlyPlanSlot>,
}

#[derive(Debug, Serialize)]
pub struct ApprovalResult {
    pub subscription: Subscription,
    pub slots: Vec<MonthlyPlanSlot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(day: i16, h: u32, m: u32) -> PlanScheduleRequest {
        PlanScheduleRequest {
            day_of_week: day,
            start_time: NaiveTime::from_hms_opt(h, m, 0).unwrap(),
        }
    }

    fn plan(schedule: Vec<PlanScheduleRequest>) -> CreateMonthlyPlanRequest {
        CreateMonthlyPlanRequest {
            name: "Strength Block".to_string(),
            description: None,
            sessions_per_month: 8,
            session_duration_minutes: 60,
            price_cents: 20000,
            max_subscribers: 5,
            schedule,
        }
    }

    #[test]
    fn test_valid_plan() {
        assert!(plan(vec![entry(0, 9, 0), entry(3, 9, 0)]).validate().is_ok());
    }

    #[test]
    fn test_empty_and_duplicate_schedules_rejected() {
        assert!(plan(vec![]).validate().is_err());
        assert!(plan(vec![entry(0, 9, 0), entry(0, 9, 0)]).validate().is_err());
    }

    #[test]
    fn test_duration_bounds() {
        let mut request = plan(vec![entry(1, 7, 0)]);
        request.session_duration_minutes = 10;
        assert!(request.validate().is_err());
        request.session_duration_minutes = 241;
        assert!(request.validate().is_err());
        request.session_duration_minutes = 240;
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_midnight_crossing() {
        let late = NaiveTime::from_hms_opt(23, 30, 0).unwrap();
        assert!(crosses_midnight(late, 60));
        assert!(crosses_midnight(late, 30));
        assert!(!crosses_midnight(late, 29));
        assert!(plan(vec![entry(4, 23, 30)]).validate().is_err());
    }
}

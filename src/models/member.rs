use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::validation::{
    validate_email, validate_optional_text, validate_phone, validate_text,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "membership_status", rename_all = "snake_case")]
pub enum MembershipStatus {
    None,
    Pending,
    Active,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MemberProfile {
    pub user_id: Uuid,
    pub membership_plan_id: Option<Uuid>,
    pub membership_status: MembershipStatus,
    pub membership_start: Option<NaiveDate>,
    pub membership_end: Option<NaiveDate>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub emergency_contact: Option<String>,
    pub fitness_goals: Option<String>,
    pub loyalty_points: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A member user joined with their profile and plan name
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MemberSummary {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub membership_plan_id: Option<Uuid>,
    pub plan_name: Option<String>,
    pub membership_status: MembershipStatus,
    pub membership_start: Option<NaiveDate>,
    pub membership_end: Option<NaiveDate>,
    pub loyalty_points: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMemberRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub membership_plan_id: Uuid,
}

impl CreateMemberRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_email(&self.email)?;
        validate_text("full_name", &self.full_name, 120)?;
        if let Some(phone) = &self.phone {
            validate_phone(phone)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMemberProfileRequest {
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub emergency_contact: Option<String>,
    pub fitness_goals: Option<String>,
}

impl UpdateMemberProfileRequest {
    pub fn validate(&self, today: NaiveDate) -> AppResult<()> {
        if let Some(dob) = self.date_of_birth {
            if dob > today {
                return Err(AppError::validation("Date of birth cannot be in the future"));
            }
        }
        validate_optional_text("gender", self.gender.as_deref(), 30)?;
        validate_optional_text("emergency_contact", self.emergency_contact.as_deref(), 200)?;
        validate_optional_text("fitness_goals", self.fitness_goals.as_deref(), 2000)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MembershipAction {
    Approve,
    Renew,
    Cancel,
}

#[derive(Debug, Deserialize)]
pub struct MembershipActionRequest {
    pub action: MembershipAction,
    pub membership_plan_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct MembershipPlanRequest {
    pub membership_plan_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct MemberListQuery {
    pub status: Option<MembershipStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_rejects_future_birthday() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let request = UpdateMemberProfileRequest {
            date_of_birth: NaiveDate::from_ymd_opt(2024, 6, 2),
            ..Default::default()
        };
        assert!(request.validate(today).is_err());

        let request = UpdateMemberProfileRequest {
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 15),
            fitness_goals: Some("Run a 10k".to_string()),
            ..Default::default()
        };
        assert!(request.validate(today).is_ok());
    }

    #[test]
    fn test_membership_action_parsing() {
        let request: MembershipActionRequest =
            serde_json::from_str(r#"{"action":"renew","membership_plan_id":null}"#).unwrap();
        assert_eq!(request.action, MembershipAction::Renew);
        assert!(serde_json::from_str::<MembershipActionRequest>(r#"{"action":"pause"}"#).is_err());
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::validation::{validate_optional_text, validate_price, validate_range, validate_text};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MembershipPlan {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub duration_months: i32,
    pub price_cents: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMembershipPlanRequest {
    pub name: String,
    pub description: Option<String>,
    pub duration_months: i32,
    pub price_cents: i64,
}

impl CreateMembershipPlanRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_text("name", &self.name, 100)?;
        validate_optional_text("description", self.description.as_deref(), 2000)?;
        validate_range("duration_months", self.duration_months, 1, 120)?;
        validate_price("price_cents", self.price_cents)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMembershipPlanRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub duration_months: Option<i32>,
    pub price_cents: Option<i64>,
    pub is_active: Option<bool>,
}

impl UpdateMembershipPlanRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_optional_text("name", self.name.as_deref(), 100)?;
        validate_optional_text("description", self.description.as_deref(), 2000)?;
        if let Some(months) = self.duration_months {
            validate_range("duration_months", months, 1, 120)?;
        }
        if let Some(price) = self.price_cents {
            validate_price("price_cents", price)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_validation() {
        let request = CreateMembershipPlanRequest {
            name: "Monthly".to_string(),
            description: None,
            duration_months: 1,
            price_cents: 4999,
        };
        assert!(request.validate().is_ok());

        let request = CreateMembershipPlanRequest {
            duration_months: 0,
            ..request
        };
        assert!(request.validate().is_err());

        let update = UpdateMembershipPlanRequest {
            price_cents: Some(-5),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }
}

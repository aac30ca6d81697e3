use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::validation::{validate_optional_text, validate_range, validate_text};

pub const ACTIVITY_LEVELS: [&str; 5] = ["sedentary", "light", "moderate", "active", "very_active"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "diet_request_status", rename_all = "snake_case")]
pub enum DietRequestStatus {
    Pending,
    InProgress,
    Completed,
    Rejected,
}

impl DietRequestStatus {
    pub fn is_open(self) -> bool {
        matches!(self, DietRequestStatus::Pending | DietRequestStatus::InProgress)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DietPlanRequest {
    pub id: Uuid,
    pub member_id: Uuid,
    pub nutritionist_id: Option<Uuid>,
    pub goal: String,
    pub current_weight_kg: f64,
    pub target_weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub activity_level: String,
    pub dietary_restrictions: Option<String>,
    pub notes: Option<String>,
    pub status: DietRequestStatus,
    pub plan_details: Option<String>,
    pub daily_calories: Option<i32>,
    pub response_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDietRequest {
    pub goal: String,
    pub current_weight_kg: f64,
    pub target_weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub activity_level: String,
    pub dietary_restrictions: Option<String>,
    pub notes: Option<String>,
}

impl CreateDietRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_text("goal", &self.goal, 500)?;
        validate_range("current_weight_kg", self.current_weight_kg, 20.0, 400.0)?;
        if let Some(target) = self.target_weight_kg {
            validate_range("target_weight_kg", target, 20.0, 400.0)?;
        }
        if let Some(height) = self.height_cm {
            validate_range("height_cm", height, 50.0, 280.0)?;
        }
        if !ACTIVITY_LEVELS.contains(&self.activity_level.as_str()) {
            return Err(AppError::validation(format!(
                "activity_level must be one of: {}",
                ACTIVITY_LEVELS.join(", ")
            )));
        }
        validate_optional_text("dietary_restrictions", self.dietary_restrictions.as_deref(), 1000)?;
        validate_optional_text("notes", self.notes.as_deref(), 2000)
    }
}

#[derive(Debug, Deserialize)]
pub struct RespondDietRequest {
    pub plan_details: String,
    pub daily_calories: i32,
    pub response_notes: Option<String>,
}

impl RespondDietRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_text("plan_details", &self.plan_details, 20000)?;
        validate_range("daily_calories", self.daily_calories, 800, 6000)?;
        validate_optional_text("response_notes", self.response_notes.as_deref(), 2000)
    }
}

#[derive(Debug, Deserialize)]
pub struct RejectDietRequest {
    pub response_notes: String,
}

impl RejectDietRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_text("response_notes", &self.response_notes, 2000)
    }
}

#[derive(Debug, Deserialize)]
pub struct DietRequestListQuery {
    pub status: Option<DietRequestStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

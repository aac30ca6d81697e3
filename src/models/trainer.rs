use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::time_range::TimeRange;
use crate::models::validation::{
    validate_day_of_week, validate_non_negative, validate_optional_text, validate_range,
    validate_time_window,
};

/// Public trainer card: user name plus trainer profile
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrainerCard {
    pub user_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub specialization: String,
    pub bio: Option<String>,
    pub experience_years: i32,
    pub hourly_rate_cents: i64,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrainerScheduleEntry {
    pub id: Uuid,
    pub trainer_id: Uuid,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Serialize)]
pub struct TrainerDetail {
    #[serde(flatten)]
    pub trainer: TrainerCard,
    pub schedule: Vec<TrainerScheduleEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTrainerRequest {
    pub specialization: Option<String>,
    pub bio: Option<String>,
    pub experience_years: Option<i32>,
    pub hourly_rate_cents: Option<i64>,
    pub is_available: Option<bool>,
}

impl UpdateTrainerRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_optional_text("specialization", self.specialization.as_deref(), 120)?;
        validate_optional_text("bio", self.bio.as_deref(), 4000)?;
        if let Some(years) = self.experience_years {
            validate_range("experience_years", years, 0, 80)?;
        }
        if let Some(rate) = self.hourly_rate_cents {
            validate_non_negative("hourly_rate_cents", rate)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScheduleWindow {
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceScheduleRequest {
    pub windows: Vec<ScheduleWindow>,
}

impl ReplaceScheduleRequest {
    /// Every window is well-formed and no two windows on one day overlap
    pub fn validate(&self) -> AppResult<()> {
        for window in &self.windows {
            validate_day_of_week(window.day_of_week)?;
            validate_time_window(window.start_time, window.end_time)?;
        }

        for (i, a) in self.windows.iter().enumerate() {
            for b in &self.windows[i + 1..] {
                let same_day = a.day_of_week == b.day_of_week;
                let a_range = TimeRange::new(a.start_time, a.end_time);
                let b_range = TimeRange::new(b.start_time, b.end_time);
                if same_day && a_range.overlaps(&b_range) {
                    return Err(AppError::validation(format!(
                        "Schedule windows overlap on day {}: {}-{} and {}-{}",
                        a.day_of_week, a.start_time, a.end_time, b.start_time, b.end_time
                    )));
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct TrainerAvailability {
    pub trainer_id: Uuid,
    pub date: NaiveDate,
    pub free: Vec<TimeRange>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(day: i16, start: u32, end: u32) -> ScheduleWindow {
        ScheduleWindow {
            day_of_week: day,
            start_time: NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_schedule_accepts_disjoint_windows() {
        let request = ReplaceScheduleRequest {
            windows: vec![window(0, 8, 12), window(0, 12, 16), window(1, 8, 12)],
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_schedule_rejects_overlap_on_same_day() {
        let request = ReplaceScheduleRequest {
            windows: vec![window(2, 8, 12), window(2, 11, 14)],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_schedule_rejects_inverted_window_and_bad_day() {
        let inverted = ReplaceScheduleRequest {
            windows: vec![window(0, 12, 8)],
        };
        assert!(inverted.validate().is_err());

        let bad_day = ReplaceScheduleRequest {
            windows: vec![window(7, 8, 9)],
        };
        assert!(bad_day.validate().is_err());
    }

    #[test]
    fn test_empty_schedule_is_allowed() {
        assert!(ReplaceScheduleRequest { windows: vec![] }.validate().is_ok());
    }
}

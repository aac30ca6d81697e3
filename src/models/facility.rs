use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::validation::{
    validate_date_range, validate_day_of_week, validate_optional_text, validate_range,
    validate_text, validate_time_window,
};

pub const MAX_GENERATION_DAYS: i64 = 92;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Facility {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub capacity: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FacilityAvailability {
    pub id: Uuid,
    pub facility_id: Uuid,
    pub day_of_week: i16,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub slot_duration_minutes: i32,
}

#[derive(Debug, Serialize)]
pub struct FacilityDetail {
    #[serde(flatten)]
    pub facility: Facility,
    pub availability: Vec<FacilityAvailability>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFacilityRequest {
    pub name: String,
    pub description: Option<String>,
    pub capacity: i32,
}

impl CreateFacilityRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_text("name", &self.name, 100)?;
        validate_optional_text("description", self.description.as_deref(), 2000)?;
        validate_range("capacity", self.capacity, 1, 1000)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateFacilityRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub capacity: Option<i32>,
    pub is_active: Option<bool>,
}

impl UpdateFacilityRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_optional_text("name", self.name.as_deref(), 100)?;
        validate_optional_text("description", self.description.as_deref(), 2000)?;
        if let Some(capacity) = self.capacity {
            validate_range("capacity", capacity, 1, 1000)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AvailabilityWindow {
    pub day_of_week: i16,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub slot_duration_minutes: i32,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceAvailabilityRequest {
    pub windows: Vec<AvailabilityWindow>,
}

impl ReplaceAvailabilityRequest {
    pub fn validate(&self) -> AppResult<()> {
        for window in &self.windows {
            validate_day_of_week(window.day_of_week)?;
            validate_time_window(window.open_time, window.close_time)?;
            validate_range("slot_duration_minutes", window.slot_duration_minutes, 15, 240)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateSlotsRequest {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl GenerateSlotsRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_date_range(self.from, self.to, MAX_GENERATION_DAYS)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerateSlotsResponse {
    pub generated: u64,
    pub skipped_existing: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FacilitySlot {
    pub id: Uuid,
    pub facility_id: Uuid,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub capacity: i32,
    pub booked_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct FacilitySlotView {
    #[serde(flatten)]
    pub slot: FacilitySlot,
    pub remaining: i32,
}

impl From<FacilitySlot> for FacilitySlotView {
    fn from(slot: FacilitySlot) -> Self {
        let remaining = (slot.capacity - slot.booked_count).max(0);
        Self { slot, remaining }
    }
}

#[derive(Debug, Deserialize)]
pub struct SlotDateQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FacilityBooking {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub member_id: Uuid,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Booking joined with its slot and facility name
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BookingSummary {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub facility_id: Uuid,
    pub facility_name: String,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_capacity() {
        let slot = FacilitySlot {
            id: Uuid::new_v4(),
            facility_id: Uuid::new_v4(),
            slot_date: NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(),
            start_time: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            capacity: 12,
            booked_count: 5,
            created_at: Utc::now(),
        };
        assert_eq!(FacilitySlotView::from(slot).remaining, 7);
    }

    #[test]
    fn test_availability_validation() {
        let window = AvailabilityWindow {
            day_of_week: 0,
            open_time: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            close_time: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            slot_duration_minutes: 60,
        };
        assert!(ReplaceAvailabilityRequest { windows: vec![window] }.validate().is_ok());

        let short = AvailabilityWindow {
            slot_duration_minutes: 10,
            ..window
        };
        assert!(ReplaceAvailabilityRequest { windows: vec![short] }.validate().is_err());
    }

    #[test]
    fn test_generation_range_limit() {
        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let ok = GenerateSlotsRequest {
            from,
            to: from + chrono::Duration::days(91),
        };
        assert!(ok.validate().is_ok());

        let too_long = GenerateSlotsRequest {
            from,
            to: from + chrono::Duration::days(92),
        };
        assert!(too_long.validate().is_err());
    }
}

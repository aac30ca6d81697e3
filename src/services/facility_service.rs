use chrono::{NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::auth::UserSession;
use crate::error::{AppError, AppResult};
use crate::models::{
    AvailabilityWindow, BookingStatus, BookingSummary, CreateFacilityRequest, Facility,
    FacilityAvailability, FacilityBooking, FacilityDetail, FacilitySlot, FacilitySlotView,
    GenerateSlotsRequest, GenerateSlotsResponse, ReplaceAvailabilityRequest,
    UpdateFacilityRequest,
};
use crate::services::member_service::MemberService;
use crate::services::slot_generation::generate_facility_slots;

const FACILITY_COLUMNS: &str = "id, name, description, capacity, is_active, created_at, updated_at";
const SLOT_COLUMNS: &str =
    "id, facility_id, slot_date, start_time, end_time, capacity, booked_count, created_at";
const BOOKING_COLUMNS: &str = "id, slot_id, member_id, status, created_at, updated_at";

/// True once the slot has started
pub fn slot_has_started(date: NaiveDate, start: NaiveTime, today: NaiveDate, now: NaiveTime) -> bool {
    date < today || (date == today && start <= now)
}

#[derive(Clone)]
pub struct FacilityService {
    db: PgPool,
}

impl FacilityService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_active(&self) -> AppResult<Vec<Facility>> {
        let facilities = sqlx::query_as::<_, Facility>(&format!(
            "SELECT {FACILITY_COLUMNS} FROM facilities WHERE is_active ORDER BY name"
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(facilities)
    }

    pub async fn get(&self, facility_id: Uuid) -> AppResult<FacilityDetail> {
        let facility = self.load(facility_id).await?;
        let availability = self.availability(facility_id).await?;
        Ok(FacilityDetail { facility, availability })
    }

    pub async fn create(&self, request: CreateFacilityRequest) -> AppResult<Facility> {
        request.validate()?;

        let facility = sqlx::query_as::<_, Facility>(&format!(
            "INSERT INTO facilities (name, description, capacity)
             VALUES ($1, $2, $3)
             RETURNING {FACILITY_COLUMNS}"
        ))
        .bind(request.name.trim())
        .bind(&request.description)
        .bind(request.capacity)
        .fetch_one(&self.db)
        .await?;

        info!(facility_id = %facility.id, name = %facility.name, "created facility");
        Ok(facility)
    }

    pub async fn update(&self, facility_id: Uuid, request: UpdateFacilityRequest) -> AppResult<Facility> {
        request.validate()?;

        sqlx::query_as::<_, Facility>(&format!(
            "UPDATE facilities
             SET name = COALESCE($2, name),
                 description = COALESCE($3, description),
                 capacity = COALESCE($4, capacity),
                 is_active = COALESCE($5, is_active),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {FACILITY_COLUMNS}"
        ))
        .bind(facility_id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(&request.description)
        .bind(request.capacity)
        .bind(request.is_active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Facility {facility_id} not found")))
    }

    pub async fn deactivate(&self, facility_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("UPDATE facilities SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(facility_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Facility {facility_id} not found")));
        }

        info!(facility_id = %facility_id, "deactivated facility");
        Ok(())
    }

    pub async fn replace_availability(
        &self,
        facility_id: Uuid,
        request: ReplaceAvailabilityRequest,
    ) -> AppResult<Vec<FacilityAvailability>> {
        request.validate()?;
        self.load(facility_id).await?;

        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM facility_availability WHERE facility_id = $1")
            .bind(facility_id)
            .execute(&mut *tx)
            .await?;

        for window in &request.windows {
            sqlx::query(
                "INSERT INTO facility_availability
                    (facility_id, day_of_week, open_time, close_time, slot_duration_minutes)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(facility_id)
            .bind(window.day_of_week)
            .bind(window.open_time)
            .bind(window.close_time)
            .bind(window.slot_duration_minutes)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(facility_id = %facility_id, windows = request.windows.len(), "replaced facility availability");
        self.availability(facility_id).await
    }

    /// Materialise slots from the availability template; existing slots are kept
    pub async fn generate_slots(
        &self,
        facility_id: Uuid,
        request: GenerateSlotsRequest,
    ) -> AppResult<GenerateSlotsResponse> {
        request.validate()?;
        let facility = self.load(facility_id).await?;

        let windows: Vec<AvailabilityWindow> = self
            .availability(facility_id)
            .await?
            .into_iter()
            .map(|row| AvailabilityWindow {
                day_of_week: row.day_of_week,
                open_time: row.open_time,
                close_time: row.close_time,
                slot_duration_minutes: row.slot_duration_minutes,
            })
            .collect();

        let planned = generate_facility_slots(&windows, request.from, request.to);

        let mut tx = self.db.begin().await?;
        let mut generated = 0;
        for slot in &planned {
            generated += sqlx::query(
                "INSERT INTO facility_slots (facility_id, slot_date, start_time, end_time, capacity)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (facility_id, slot_date, start_time) DO NOTHING",
            )
            .bind(facility_id)
            .bind(slot.date)
            .bind(slot.start)
            .bind(slot.end)
            .bind(facility.capacity)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }
        tx.commit().await?;

        let skipped_existing = planned.len() as u64 - generated;
        info!(facility_id = %facility_id, generated, skipped_existing, "generated facility slots");

        Ok(GenerateSlotsResponse {
            generated,
            skipped_existing,
        })
    }

    pub async fn slots_on(&self, facility_id: Uuid, date: NaiveDate) -> AppResult<Vec<FacilitySlotView>> {
        self.load(facility_id).await?;

        let slots = sqlx::query_as::<_, FacilitySlot>(&format!(
            "SELECT {SLOT_COLUMNS} FROM facility_slots
             WHERE facility_id = $1 AND slot_date = $2
             ORDER BY start_time"
        ))
        .bind(facility_id)
        .bind(date)
        .fetch_all(&self.db)
        .await?;

        Ok(slots.into_iter().map(FacilitySlotView::from).collect())
    }

    pub async fn book(&self, member_id: Uuid, slot_id: Uuid) -> AppResult<FacilityBooking> {
        let mut tx = self.db.begin().await?;

        MemberService::require_active_membership(&mut *tx, member_id).await?;

        let slot = sqlx::query_as::<_, FacilitySlot>(&format!(
            "SELECT {SLOT_COLUMNS} FROM facility_slots WHERE id = $1 FOR UPDATE"
        ))
        .bind(slot_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Slot {slot_id} not found")))?;

        let now = Utc::now();
        if slot_has_started(slot.slot_date, slot.start_time, now.date_naive(), now.time()) {
            return Err(AppError::validation("Cannot book a slot in the past"));
        }

        if slot.booked_count >= slot.capacity {
            return Err(AppError::conflict("Slot is fully booked"));
        }

        let already: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM facility_bookings WHERE slot_id = $1 AND member_id = $2 AND status = 'confirmed'",
        )
        .bind(slot_id)
        .bind(member_id)
        .fetch_optional(&mut *tx)
        .await?;
        if already.is_some() {
            return Err(AppError::conflict("You already have a booking for this slot"));
        }

        let booking = sqlx::query_as::<_, FacilityBooking>(&format!(
            "INSERT INTO facility_bookings (slot_id, member_id)
             VALUES ($1, $2)
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(slot_id)
        .bind(member_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE facility_slots SET booked_count = booked_count + 1 WHERE id = $1")
            .bind(slot_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(booking_id = %booking.id, slot_id = %slot_id, "booked facility slot");
        Ok(booking)
    }

    pub async fn cancel_booking(&self, actor: &UserSession, booking_id: Uuid) -> AppResult<FacilityBooking> {
        let mut tx = self.db.begin().await?;

        let booking = sqlx::query_as::<_, FacilityBooking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM facility_bookings WHERE id = $1 FOR UPDATE"
        ))
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Booking {booking_id} not found")))?;

        if booking.member_id != actor.user_id && !actor.is_admin() {
            return Err(AppError::forbidden("You cannot cancel this booking"));
        }
        if booking.status != BookingStatus::Confirmed {
            return Err(AppError::conflict("Booking is already cancelled"));
        }

        let cancelled = sqlx::query_as::<_, FacilityBooking>(&format!(
            "UPDATE facility_bookings SET status = 'cancelled', updated_at = NOW()
             WHERE id = $1
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE facility_slots SET booked_count = GREATEST(booked_count - 1, 0) WHERE id = $1",
        )
        .bind(booking.slot_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(booking_id = %booking_id, "cancelled facility booking");
        Ok(cancelled)
    }

    pub async fn member_bookings(&self, member_id: Uuid) -> AppResult<Vec<BookingSummary>> {
        let bookings = sqlx::query_as::<_, BookingSummary>(
            "SELECT b.id, b.slot_id, s.facility_id, f.name AS facility_name, s.slot_date,
                    s.start_time, s.end_time, b.status, b.created_at
             FROM facility_bookings b
             JOIN facility_slots s ON s.id = b.slot_id
             JOIN facilities f ON f.id = s.facility_id
             WHERE b.member_id = $1
             ORDER BY s.slot_date DESC, s.start_time DESC",
        )
        .bind(member_id)
        .fetch_all(&self.db)
        .await?;

        Ok(bookings)
    }

    async fn load(&self, facility_id: Uuid) -> AppResult<Facility> {
        sqlx::query_as::<_, Facility>(&format!(
            "SELECT {FACILITY_COLUMNS} FROM facilities WHERE id = $1"
        ))
        .bind(facility_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Facility {facility_id} not found")))
    }

    async fn availability(&self, facility_id: Uuid) -> AppResult<Vec<FacilityAvailability>> {
        let rows = sqlx::query_as::<_, FacilityAvailability>(
            "SELECT id, facility_id, day_of_week, open_time, close_time, slot_duration_minutes
             FROM facility_availability
             WHERE facility_id = $1
             ORDER BY day_of_week, open_time",
        )
        .bind(facility_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_has_started() {
        let today = NaiveDate::from_ymd_opt(2024, 4, 10).unwrap();
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        let morning = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let evening = NaiveTime::from_hms_opt(18, 0, 0).unwrap();

        assert!(slot_has_started(today.pred_opt().unwrap(), evening, today, noon));
        assert!(slot_has_started(today, morning, today, noon));
        assert!(slot_has_started(today, noon, today, noon));
        assert!(!slot_has_started(today, evening, today, noon));
        assert!(!slot_has_started(today.succ_opt().unwrap(), morning, today, noon));
    }
}

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{PgConnection, PgExecutor, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    ReplaceScheduleRequest, TimeRange, TrainerAvailability, TrainerCard, TrainerDetail,
    TrainerScheduleEntry, UpdateTrainerRequest,
};
use crate::services::member_service::MemberService;
use crate::services::slot_generation::{free_intervals, weekday_index};

const CARD_SELECT: &str = "SELECT t.user_id, u.full_name, u.email, t.specialization, t.bio, \
     t.experience_years, t.hourly_rate_cents, t.is_available, t.created_at \
     FROM trainers t JOIN users u ON u.id = t.user_id";

/// Rows touched when a trainer is removed
#[derive(Debug, Serialize)]
pub struct TrainerRemoval {
    pub trainer_id: Uuid,
    pub sessions_cancelled: u64,
    pub slots_cancelled: u64,
    pub subscriptions_cancelled: u64,
}

#[derive(Clone)]
pub struct TrainerService {
    db: PgPool,
}

impl TrainerService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn insert_profile(
        conn: &mut PgConnection,
        user_id: Uuid,
        specialization: Option<&str>,
        hourly_rate_cents: Option<i64>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO trainers (user_id, specialization, hourly_rate_cents)
             VALUES ($1, COALESCE($2, 'General fitness'), COALESCE($3, 0))",
        )
        .bind(user_id)
        .bind(specialization)
        .bind(hourly_rate_cents)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn ensure_profile(conn: &mut PgConnection, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO trainers (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn require_trainer<'e, E>(executor: E, trainer_id: Uuid) -> AppResult<()>
    where
        E: PgExecutor<'e>,
    {
        let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM trainers WHERE user_id = $1")
            .bind(trainer_id)
            .fetch_optional(executor)
            .await?;

        exists
            .map(|_| ())
            .ok_or_else(|| AppError::not_found(format!("Trainer {trainer_id} not found")))
    }

    pub async fn list_trainers(&self) -> AppResult<Vec<TrainerCard>> {
        let trainers = sqlx::query_as::<_, TrainerCard>(&format!(
            "{CARD_SELECT} WHERE u.is_active ORDER BY u.full_name"
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(trainers)
    }

    pub async fn get_trainer(&self, trainer_id: Uuid) -> AppResult<TrainerDetail> {
        let trainer = sqlx::query_as::<_, TrainerCard>(&format!("{CARD_SELECT} WHERE t.user_id = $1"))
            .bind(trainer_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Trainer {trainer_id} not found")))?;

        let schedule = self.get_schedule(trainer_id).await?;

        Ok(TrainerDetail { trainer, schedule })
    }

    pub async fn get_schedule(&self, trainer_id: Uuid) -> AppResult<Vec<TrainerScheduleEntry>> {
        let schedule = sqlx::query_as::<_, TrainerScheduleEntry>(
            "SELECT id, trainer_id, day_of_week, start_time, end_time
             FROM trainer_schedules
             WHERE trainer_id = $1
             ORDER BY day_of_week, start_time",
        )
        .bind(trainer_id)
        .fetch_all(&self.db)
        .await?;

        Ok(schedule)
    }

    pub async fn update_profile(
        &self,
        trainer_id: Uuid,
        request: UpdateTrainerRequest,
    ) -> AppResult<TrainerCard> {
        request.validate()?;

        let result = sqlx::query(
            "UPDATE trainers
             SET specialization = COALESCE($2, specialization),
                 bio = COALESCE($3, bio),
                 experience_years = COALESCE($4, experience_years),
                 hourly_rate_cents = COALESCE($5, hourly_rate_cents),
                 is_available = COALESCE($6, is_available),
                 updated_at = NOW()
             WHERE user_id = $1",
        )
        .bind(trainer_id)
        .bind(&request.specialization)
        .bind(&request.bio)
        .bind(request.experience_years)
        .bind(request.hourly_rate_cents)
        .bind(request.is_available)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Trainer profile not found"));
        }

        Ok(self.get_trainer(trainer_id).await?.trainer)
    }

    /// Replace the weekly availability template in one transaction
    pub async fn replace_schedule(
        &self,
        trainer_id: Uuid,
        request: ReplaceScheduleRequest,
    ) -> AppResult<Vec<TrainerScheduleEntry>> {
        request.validate()?;

        let mut tx = self.db.begin().await?;
        Self::require_trainer(&mut *tx, trainer_id).await?;

        sqlx::query("DELETE FROM trainer_schedules WHERE trainer_id = $1")
            .bind(trainer_id)
            .execute(&mut *tx)
            .await?;

        for window in &request.windows {
            sqlx::query(
                "INSERT INTO trainer_schedules (trainer_id, day_of_week, start_time, end_time)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(trainer_id)
            .bind(window.day_of_week)
            .bind(window.start_time)
            .bind(window.end_time)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(trainer_id = %trainer_id, windows = request.windows.len(), "replaced trainer schedule");
        self.get_schedule(trainer_id).await
    }

    /// Availability windows for the weekday of `date`
    pub async fn windows_on<'e, E>(executor: E, trainer_id: Uuid, date: NaiveDate) -> AppResult<Vec<TimeRange>>
    where
        E: PgExecutor<'e>,
    {
        let rows: Vec<(chrono::NaiveTime, chrono::NaiveTime)> = sqlx::query_as(
            "SELECT start_time, end_time FROM trainer_schedules
             WHERE trainer_id = $1 AND day_of_week = $2
             ORDER BY start_time",
        )
        .bind(trainer_id)
        .bind(weekday_index(date))
        .fetch_all(executor)
        .await?;

        Ok(rows.into_iter().map(|(start, end)| TimeRange::new(start, end)).collect())
    }

    /// Scheduled sessions and monthly slots a trainer already has on `date`
    pub async fn busy_on<'e, E>(executor: E, trainer_id: Uuid, date: NaiveDate) -> AppResult<Vec<TimeRange>>
    where
        E: PgExecutor<'e>,
    {
        let rows: Vec<(chrono::NaiveTime, chrono::NaiveTime)> = sqlx::query_as(
            "SELECT start_time, end_time FROM training_sessions
             WHERE trainer_id = $1 AND session_date = $2 AND status = 'scheduled'
             UNION ALL
             SELECT start_time, end_time FROM monthly_plan_slots
             WHERE trainer_id = $1 AND slot_date = $2 AND status = 'scheduled'",
        )
        .bind(trainer_id)
        .bind(date)
        .fetch_all(executor)
        .await?;

        Ok(rows.into_iter().map(|(start, end)| TimeRange::new(start, end)).collect())
    }

    pub async fn availability(&self, trainer_id: Uuid, date: NaiveDate) -> AppResult<TrainerAvailability> {
        Self::require_trainer(&self.db, trainer_id).await?;

        let windows = Self::windows_on(&self.db, trainer_id, date).await?;
        let busy = Self::busy_on(&self.db, trainer_id, date).await?;

        Ok(TrainerAvailability {
            trainer_id,
            date,
            free: free_intervals(&windows, &busy),
        })
    }

    /// Remove a trainer: cancel upcoming bookings, drop the profile, demote to member
    pub async fn delete_trainer(&self, trainer_id: Uuid) -> AppResult<TrainerRemoval> {
        let mut tx = self.db.begin().await?;

        let locked: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM trainers WHERE user_id = $1 FOR UPDATE")
                .bind(trainer_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(AppError::not_found(format!("Trainer {trainer_id} not found")));
        }

        let sessions_cancelled = sqlx::query(
            "UPDATE training_sessions
             SET status = 'cancelled', updated_at = NOW()
             WHERE trainer_id = $1 AND status = 'scheduled' AND session_date >= CURRENT_DATE",
        )
        .bind(trainer_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let slots_cancelled = sqlx::query(
            "UPDATE monthly_plan_slots
             SET status = 'cancelled'
             WHERE trainer_id = $1 AND status = 'scheduled' AND slot_date >= CURRENT_DATE",
        )
        .bind(trainer_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let subscriptions_cancelled = sqlx::query(
            "UPDATE monthly_plan_subscriptions s
             SET status = 'cancelled', updated_at = NOW()
             FROM monthly_plans p
             WHERE s.plan_id = p.id AND p.trainer_id = $1 AND s.status IN ('pending', 'active')",
        )
        .bind(trainer_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("DELETE FROM trainers WHERE user_id = $1")
            .bind(trainer_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE users SET role = 'member', updated_at = NOW() WHERE id = $1")
            .bind(trainer_id)
            .execute(&mut *tx)
            .await?;
        MemberService::ensure_profile(&mut *tx, trainer_id).await?;

        tx.commit().await?;

        info!(
            trainer_id = %trainer_id,
            sessions_cancelled,
            slots_cancelled,
            subscriptions_cancelled,
            "removed trainer"
        );

        Ok(TrainerRemoval {
            trainer_id,
            sessions_cancelled,
            slots_cancelled,
            subscriptions_cancelled,
        })
    }
}

use chrono::{NaiveDate, NaiveTime, Utc};
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::auth::UserSession;
use crate::error::{is_unique_violation, AppError, AppResult};
use crate::models::{
    ApprovalResult, CreateMonthlyPlanRequest, MonthlyPlan, MonthlyPlanDetail, MonthlyPlanSlot,
    MonthlyPlanSummary, PlanScheduleEntry, PlanScheduleRequest, SubscribeRequest, Subscription,
    SubscriptionStatus, SubscriptionSummary, SubscriptionWithSlots, TimeRange,
    UpdateMonthlyPlanRequest,
};
use crate::services::member_service::MemberService;
use crate::services::slot_generation::{add_months, assign_plan_slots};
use crate::services::trainer_service::TrainerService;

const PLAN_COLUMNS: &str = "id, trainer_id, name, description, sessions_per_month, \
     session_duration_minutes, price_cents, max_subscribers, is_active, created_at, updated_at";

const SUMMARY_SELECT: &str = "SELECT p.id, p.trainer_id, u.full_name AS trainer_name, p.name, \
     p.description, p.sessions_per_month, p.session_duration_minutes, p.price_cents, \
     p.max_subscribers, \
     (SELECT COUNT(*) FROM monthly_plan_subscriptions s \
      WHERE s.plan_id = p.id AND s.status = 'active') AS active_subscribers, \
     p.is_active \
     FROM monthly_plans p JOIN users u ON u.id = p.trainer_id";

const SUBSCRIPTION_COLUMNS: &str = "id, plan_id, member_id, status, requested_start, start_date, \
     end_date, approved_at, approved_by, created_at, updated_at";

const SUBSCRIPTION_SUMMARY_SELECT: &str = "SELECT s.id, s.plan_id, p.name AS plan_name, \
     p.trainer_id, s.member_id, u.full_name AS member_name, s.status, s.requested_start, \
     s.start_date, s.end_date, s.created_at \
     FROM monthly_plan_subscriptions s \
     JOIN monthly_plans p ON p.id = s.plan_id \
     JOIN users u ON u.id = s.member_id";

const SLOT_COLUMNS: &str = "id, subscription_id, plan_id, trainer_id, member_id, slot_date, \
     start_time, end_time, status, created_at";

#[derive(Clone)]
pub struct MonthlyPlanService {
    db: PgPool,
}

impl MonthlyPlanService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, trainer_id: Uuid, request: CreateMonthlyPlanRequest) -> AppResult<MonthlyPlanDetail> {
        request.validate()?;

        let mut tx = self.db.begin().await?;
        TrainerService::require_trainer(&mut *tx, trainer_id).await?;

        let plan = sqlx::query_as::<_, MonthlyPlan>(&format!(
            "INSERT INTO monthly_plans
                (trainer_id, name, description, sessions_per_month, session_duration_minutes,
                 price_cents, max_subscribers)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {PLAN_COLUMNS}"
        ))
        .bind(trainer_id)
        .bind(request.name.trim())
        .bind(&request.description)
        .bind(request.sessions_per_month)
        .bind(request.session_duration_minutes)
        .bind(request.price_cents)
        .bind(request.max_subscribers)
        .fetch_one(&mut *tx)
        .await?;

        for entry in &request.schedule {
            sqlx::query(
                "INSERT INTO monthly_plan_schedule (plan_id, day_of_week, start_time)
                 VALUES ($1, $2, $3)",
            )
            .bind(plan.id)
            .bind(entry.day_of_week)
            .bind(entry.start_time)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(plan_id = %plan.id, trainer_id = %trainer_id, "created monthly plan");
        self.get(plan.id).await
    }

    pub async fn list_active(&self) -> AppResult<Vec<MonthlyPlanSummary>> {
        let plans = sqlx::query_as::<_, MonthlyPlanSummary>(&format!(
            "{SUMMARY_SELECT} WHERE p.is_active ORDER BY p.created_at DESC"
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(plans)
    }

    pub async fn get(&self, plan_id: Uuid) -> AppResult<MonthlyPlanDetail> {
        let plan = sqlx::query_as::<_, MonthlyPlanSummary>(&format!("{SUMMARY_SELECT} WHERE p.id = $1"))
            .bind(plan_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Monthly plan {plan_id} not found")))?;

        let schedule = sqlx::query_as::<_, PlanScheduleEntry>(
            "SELECT id, plan_id, day_of_week, start_time FROM monthly_plan_schedule
             WHERE plan_id = $1
             ORDER BY day_of_week, start_time",
        )
        .bind(plan_id)
        .fetch_all(&self.db)
        .await?;

        Ok(MonthlyPlanDetail { plan, schedule })
    }

    pub async fn update(
        &self,
        actor: &UserSession,
        plan_id: Uuid,
        request: UpdateMonthlyPlanRequest,
    ) -> AppResult<MonthlyPlanDetail> {
        request.validate()?;
        let plan = Self::load_plan(&self.db, plan_id).await?;
        ensure_plan_owner(actor, &plan)?;

        sqlx::query(
            "UPDATE monthly_plans
             SET name = COALESCE($2, name),
                 description = COALESCE($3, description),
                 sessions_per_month = COALESCE($4, sessions_per_month),
                 price_cents = COALESCE($5, price_cents),
                 max_subscribers = COALESCE($6, max_subscribers),
                 is_active = COALESCE($7, is_active),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(plan_id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(&request.description)
        .bind(request.sessions_per_month)
        .bind(request.price_cents)
        .bind(request.max_subscribers)
        .bind(request.is_active)
        .execute(&self.db)
        .await?;

        self.get(plan_id).await
    }

    pub async fn deactivate(&self, actor: &UserSession, plan_id: Uuid) -> AppResult<()> {
        let plan = Self::load_plan(&self.db, plan_id).await?;
        ensure_plan_owner(actor, &plan)?;

        sqlx::query("UPDATE monthly_plans SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(plan_id)
            .execute(&self.db)
            .await?;

        info!(plan_id = %plan_id, "deactivated monthly plan");
        Ok(())
    }

    pub async fn subscribe(
        &self,
        member_id: Uuid,
        plan_id: Uuid,
        request: SubscribeRequest,
    ) -> AppResult<Subscription> {
        let today = Utc::now().date_naive();
        if matches!(request.requested_start, Some(date) if date < today) {
            return Err(AppError::validation("Requested start date cannot be in the past"));
        }

        MemberService::require_active_membership(&self.db, member_id).await?;

        let plan = Self::load_plan(&self.db, plan_id).await?;
        if !plan.is_active {
            return Err(AppError::validation("Monthly plan is not active"));
        }

        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            "INSERT INTO monthly_plan_subscriptions (plan_id, member_id, requested_start)
             VALUES ($1, $2, $3)
             RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(plan_id)
        .bind(member_id)
        .bind(request.requested_start)
        .fetch_one(&self.db)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AppError::conflict("You already have a pending or active subscription to this plan")
            } else {
                AppError::from(err)
            }
        })?;

        info!(subscription_id = %subscription.id, plan_id = %plan_id, "subscription requested");
        Ok(subscription)
    }

    pub async fn member_subscriptions(&self, member_id: Uuid) -> AppResult<Vec<SubscriptionWithSlots>> {
        let subscriptions = sqlx::query_as::<_, SubscriptionSummary>(&format!(
            "{SUBSCRIPTION_SUMMARY_SELECT} WHERE s.member_id = $1 ORDER BY s.created_at DESC"
        ))
        .bind(member_id)
        .fetch_all(&self.db)
        .await?;

        let slots = sqlx::query_as::<_, MonthlyPlanSlot>(&format!(
            "SELECT {SLOT_COLUMNS} FROM monthly_plan_slots
             WHERE member_id = $1
             ORDER BY slot_date, start_time"
        ))
        .bind(member_id)
        .fetch_all(&self.db)
        .await?;

        let mut by_subscription: HashMap<Uuid, Vec<MonthlyPlanSlot>> = HashMap::new();
        for slot in slots {
            by_subscription.entry(slot.subscription_id).or_default().push(slot);
        }

        Ok(subscriptions
            .into_iter()
            .map(|subscription| SubscriptionWithSlots {
                slots: by_subscription.remove(&subscription.id).unwrap_or_default(),
                subscription,
            })
            .collect())
    }

    /// Trainers see requests for their own plans; admins see all
    pub async fn pending_subscriptions(&self, actor: &UserSession) -> AppResult<Vec<SubscriptionSummary>> {
        let trainer_filter = if actor.is_admin() { None } else { Some(actor.user_id) };

        let pending = sqlx::query_as::<_, SubscriptionSummary>(&format!(
            "{SUBSCRIPTION_SUMMARY_SELECT}
             WHERE s.status = 'pending' AND ($1::uuid IS NULL OR p.trainer_id = $1)
             ORDER BY s.created_at"
        ))
        .bind(trainer_filter)
        .fetch_all(&self.db)
        .await?;

        Ok(pending)
    }

    /// Activate a pending subscription and lay out its slots
    pub async fn approve(&self, actor: &UserSession, subscription_id: Uuid) -> AppResult<ApprovalResult> {
        let mut tx = self.db.begin().await?;

        let subscription = Self::lock_subscription(&mut *tx, subscription_id).await?;

        // Locking the plan row serialises approvals competing for the last seat
        let plan = sqlx::query_as::<_, MonthlyPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM monthly_plans WHERE id = $1 FOR UPDATE"
        ))
        .bind(subscription.plan_id)
        .fetch_one(&mut *tx)
        .await?;
        ensure_plan_owner(actor, &plan)?;

        if subscription.status != SubscriptionStatus::Pending {
            return Err(AppError::conflict(format!(
                "Only pending subscriptions can be approved (current: {:?})",
                subscription.status
            )));
        }

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM monthly_plan_subscriptions WHERE plan_id = $1 AND status = 'active'",
        )
        .bind(plan.id)
        .fetch_one(&mut *tx)
        .await?;
        if active >= plan.max_subscribers as i64 {
            return Err(AppError::conflict("Monthly plan is full"));
        }

        let today = Utc::now().date_naive();
        let start = subscription.requested_start.map_or(today, |requested| requested.max(today));
        let end = add_months(start, 1);

        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            "UPDATE monthly_plan_subscriptions
             SET status = 'active', start_date = $2, end_date = $3,
                 approved_at = NOW(), approved_by = $4, updated_at = NOW()
             WHERE id = $1
             RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(subscription.id)
        .bind(start)
        .bind(end)
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await?;

        let schedule: Vec<PlanScheduleRequest> = sqlx::query_as::<_, (i16, NaiveTime)>(
            "SELECT day_of_week, start_time FROM monthly_plan_schedule WHERE plan_id = $1",
        )
        .bind(plan.id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|(day_of_week, start_time)| PlanScheduleRequest { day_of_week, start_time })
        .collect();

        let busy = Self::trainer_busy_between(&mut *tx, plan.trainer_id, start, end).await?;
        let planned = assign_plan_slots(
            &schedule,
            plan.session_duration_minutes,
            plan.sessions_per_month as u32,
            start,
            end,
            &busy,
        );

        let mut slots = Vec::with_capacity(planned.len());
        for slot in &planned {
            let row = sqlx::query_as::<_, MonthlyPlanSlot>(&format!(
                "INSERT INTO monthly_plan_slots
                    (subscription_id, plan_id, trainer_id, member_id, slot_date, start_time, end_time)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 RETURNING {SLOT_COLUMNS}"
            ))
            .bind(subscription.id)
            .bind(plan.id)
            .bind(plan.trainer_id)
            .bind(subscription.member_id)
            .bind(slot.date)
            .bind(slot.start)
            .bind(slot.end)
            .fetch_one(&mut *tx)
            .await?;
            slots.push(row);
        }

        tx.commit().await?;

        info!(
            subscription_id = %subscription.id,
            slots = slots.len(),
            requested = plan.sessions_per_month,
            "approved subscription"
        );

        Ok(ApprovalResult { subscription, slots })
    }

    pub async fn reject(&self, actor: &UserSession, subscription_id: Uuid) -> AppResult<Subscription> {
        let mut tx = self.db.begin().await?;

        let subscription = Self::lock_subscription(&mut *tx, subscription_id).await?;
        let plan = Self::load_plan(&mut *tx, subscription.plan_id).await?;
        ensure_plan_owner(actor, &plan)?;

        if subscription.status != SubscriptionStatus::Pending {
            return Err(AppError::conflict("Only pending subscriptions can be rejected"));
        }

        let updated = Self::set_status(&mut *tx, subscription_id, SubscriptionStatus::Rejected).await?;
        tx.commit().await?;

        info!(subscription_id = %subscription_id, "rejected subscription");
        Ok(updated)
    }

    /// Cancel a pending or active subscription and release its future slots
    pub async fn cancel(&self, actor: &UserSession, subscription_id: Uuid) -> AppResult<Subscription> {
        let mut tx = self.db.begin().await?;

        let subscription = Self::lock_subscription(&mut *tx, subscription_id).await?;
        let plan = Self::load_plan(&mut *tx, subscription.plan_id).await?;

        let permitted = actor.is_admin()
            || actor.user_id == subscription.member_id
            || actor.user_id == plan.trainer_id;
        if !permitted {
            return Err(AppError::forbidden("You cannot cancel this subscription"));
        }

        if !matches!(
            subscription.status,
            SubscriptionStatus::Pending | SubscriptionStatus::Active
        ) {
            return Err(AppError::conflict(format!(
                "Cannot cancel a subscription in status {:?}",
                subscription.status
            )));
        }

        let updated = Self::set_status(&mut *tx, subscription_id, SubscriptionStatus::Cancelled).await?;

        let released = sqlx::query(
            "UPDATE monthly_plan_slots SET status = 'cancelled'
             WHERE subscription_id = $1 AND status = 'scheduled' AND slot_date >= CURRENT_DATE",
        )
        .bind(subscription_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        info!(subscription_id = %subscription_id, released, "cancelled subscription");
        Ok(updated)
    }

    /// Upcoming scheduled slots where the caller is trainer or member
    pub async fn upcoming_slots(&self, actor: &UserSession) -> AppResult<Vec<MonthlyPlanSlot>> {
        let slots = sqlx::query_as::<_, MonthlyPlanSlot>(&format!(
            "SELECT {SLOT_COLUMNS} FROM monthly_plan_slots
             WHERE (trainer_id = $1 OR member_id = $1)
               AND status = 'scheduled' AND slot_date >= CURRENT_DATE
             ORDER BY slot_date, start_time"
        ))
        .bind(actor.user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(slots)
    }

    /// Flip active subscriptions whose term has ended
    pub async fn expire_subscriptions(&self) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE monthly_plan_subscriptions
             SET status = 'expired', updated_at = NOW()
             WHERE status = 'active' AND end_date <= CURRENT_DATE",
        )
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    async fn load_plan<'e, E>(executor: E, plan_id: Uuid) -> AppResult<MonthlyPlan>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query_as::<_, MonthlyPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM monthly_plans WHERE id = $1"
        ))
        .bind(plan_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Monthly plan {plan_id} not found")))
    }

    async fn lock_subscription(conn: &mut PgConnection, subscription_id: Uuid) -> AppResult<Subscription> {
        sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM monthly_plan_subscriptions WHERE id = $1 FOR UPDATE"
        ))
        .bind(subscription_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Subscription {subscription_id} not found")))
    }

    async fn set_status(
        conn: &mut PgConnection,
        subscription_id: Uuid,
        status: SubscriptionStatus,
    ) -> AppResult<Subscription> {
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            "UPDATE monthly_plan_subscriptions SET status = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(subscription_id)
        .bind(status)
        .fetch_one(conn)
        .await?;

        Ok(subscription)
    }

    /// Scheduled sessions and slots per date in `[start, end)`
    async fn trainer_busy_between(
        conn: &mut PgConnection,
        trainer_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<HashMap<NaiveDate, Vec<TimeRange>>> {
        let rows: Vec<(NaiveDate, NaiveTime, NaiveTime)> = sqlx::query_as(
            "SELECT session_date, start_time, end_time FROM training_sessions
             WHERE trainer_id = $1 AND status = 'scheduled'
               AND session_date >= $2 AND session_date < $3
             UNION ALL
             SELECT slot_date, start_time, end_time FROM monthly_plan_slots
             WHERE trainer_id = $1 AND status = 'scheduled'
               AND slot_date >= $2 AND slot_date < $3",
        )
        .bind(trainer_id)
        .bind(start)
        .bind(end)
        .fetch_all(conn)
        .await?;

        let mut busy: HashMap<NaiveDate, Vec<TimeRange>> = HashMap::new();
        for (date, start_time, end_time) in rows {
            busy.entry(date).or_default().push(TimeRange::new(start_time, end_time));
        }
        Ok(busy)
    }
}

fn ensure_plan_owner(actor: &UserSession, plan: &MonthlyPlan) -> AppResult<()> {
    if actor.is_admin() || actor.user_id == plan.trainer_id {
        Ok(())
    } else {
        Err(AppError::forbidden("Only the plan's trainer can manage it"))
    }
}

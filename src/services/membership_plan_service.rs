use sqlx::{PgExecutor, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{CreateMembershipPlanRequest, MembershipPlan, UpdateMembershipPlanRequest};

const PLAN_COLUMNS: &str =
    "id, name, description, duration_months, price_cents, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct MembershipPlanService {
    db: PgPool,
}

impl MembershipPlanService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Load a plan that members may sign up for; anything else is a bad request
    pub async fn find_active_plan<'e, E>(executor: E, plan_id: Uuid) -> AppResult<MembershipPlan>
    where
        E: PgExecutor<'e>,
    {
        let plan = sqlx::query_as::<_, MembershipPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM membership_plans WHERE id = $1"
        ))
        .bind(plan_id)
        .fetch_optional(executor)
        .await?;

        match plan {
            Some(plan) if plan.is_active => Ok(plan),
            _ => Err(AppError::validation(
                "Membership plan does not exist or is not active",
            )),
        }
    }

    pub async fn list_active(&self) -> AppResult<Vec<MembershipPlan>> {
        let plans = sqlx::query_as::<_, MembershipPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM membership_plans
             WHERE is_active
             ORDER BY price_cents, name"
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(plans)
    }

    pub async fn get(&self, plan_id: Uuid) -> AppResult<MembershipPlan> {
        sqlx::query_as::<_, MembershipPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM membership_plans WHERE id = $1"
        ))
        .bind(plan_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Membership plan {plan_id} not found")))
    }

    pub async fn create(&self, request: CreateMembershipPlanRequest) -> AppResult<MembershipPlan> {
        request.validate()?;

        let plan = sqlx::query_as::<_, MembershipPlan>(&format!(
            "INSERT INTO membership_plans (name, description, duration_months, price_cents)
             VALUES ($1, $2, $3, $4)
             RETURNING {PLAN_COLUMNS}"
        ))
        .bind(request.name.trim())
        .bind(&request.description)
        .bind(request.duration_months)
        .bind(request.price_cents)
        .fetch_one(&self.db)
        .await
        .map_err(unique_name)?;

        info!(plan_id = %plan.id, name = %plan.name, "created membership plan");
        Ok(plan)
    }

    pub async fn update(
        &self,
        plan_id: Uuid,
        request: UpdateMembershipPlanRequest,
    ) -> AppResult<MembershipPlan> {
        request.validate()?;

        sqlx::query_as::<_, MembershipPlan>(&format!(
            "UPDATE membership_plans
             SET name = COALESCE($2, name),
                 description = COALESCE($3, description),
                 duration_months = COALESCE($4, duration_months),
                 price_cents = COALESCE($5, price_cents),
                 is_active = COALESCE($6, is_active),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {PLAN_COLUMNS}"
        ))
        .bind(plan_id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(&request.description)
        .bind(request.duration_months)
        .bind(request.price_cents)
        .bind(request.is_active)
        .fetch_optional(&self.db)
        .await
        .map_err(unique_name)?
        .ok_or_else(|| AppError::not_found(format!("Membership plan {plan_id} not found")))
    }

    /// Plans stay referenced by member profiles, so they are only deactivated
    pub async fn deactivate(&self, plan_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE membership_plans SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(plan_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Membership plan {plan_id} not found")));
        }

        info!(plan_id = %plan_id, "deactivated membership plan");
        Ok(())
    }
}

fn unique_name(err: sqlx::Error) -> AppError {
    if crate::error::is_unique_violation(&err) {
        AppError::conflict("A membership plan with this name already exists")
    } else {
        AppError::from(err)
    }
}

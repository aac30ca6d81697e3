use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::auth::UserSession;
use crate::error::{is_unique_violation, AppError, AppResult};
use crate::models::{
    CreateDietRequest, DietPlanRequest, DietRequestListQuery, DietRequestStatus, Page,
    RejectDietRequest, RespondDietRequest,
};

const REQUEST_COLUMNS: &str = "id, member_id, nutritionist_id, goal, current_weight_kg, \
     target_weight_kg, height_cm, activity_level, dietary_restrictions, notes, status, \
     plan_details, daily_calories, response_notes, created_at, updated_at";

#[derive(Clone)]
pub struct DietPlanService {
    db: PgPool,
}

impl DietPlanService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, member_id: Uuid, request: CreateDietRequest) -> AppResult<DietPlanRequest> {
        request.validate()?;

        let created = sqlx::query_as::<_, DietPlanRequest>(&format!(
            "INSERT INTO diet_plan_requests
                (member_id, goal, current_weight_kg, target_weight_kg, height_cm,
                 activity_level, dietary_restrictions, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(member_id)
        .bind(request.goal.trim())
        .bind(request.current_weight_kg)
        .bind(request.target_weight_kg)
        .bind(request.height_cm)
        .bind(&request.activity_level)
        .bind(&request.dietary_restrictions)
        .bind(&request.notes)
        .fetch_one(&self.db)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AppError::conflict("You already have an open diet plan request")
            } else {
                err.into()
            }
        })?;

        info!(request_id = %created.id, member_id = %member_id, "diet plan requested");
        Ok(created)
    }

    pub async fn member_requests(&self, member_id: Uuid) -> AppResult<Vec<DietPlanRequest>> {
        let requests = sqlx::query_as::<_, DietPlanRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM diet_plan_requests
             WHERE member_id = $1
             ORDER BY created_at DESC"
        ))
        .bind(member_id)
        .fetch_all(&self.db)
        .await?;

        Ok(requests)
    }

    /// Without a status filter only open requests are listed
    pub async fn list(&self, query: &DietRequestListQuery) -> AppResult<Vec<DietPlanRequest>> {
        let page = Page::from_params(query.limit, query.offset)?;

        let requests = sqlx::query_as::<_, DietPlanRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM diet_plan_requests
             WHERE ($1::diet_request_status IS NULL AND status IN ('pending', 'in_progress'))
                OR status = $1
             ORDER BY created_at
             LIMIT $2 OFFSET $3"
        ))
        .bind(query.status)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;

        Ok(requests)
    }

    pub async fn claim(&self, nutritionist_id: Uuid, request_id: Uuid) -> AppResult<DietPlanRequest> {
        let claimed = sqlx::query_as::<_, DietPlanRequest>(&format!(
            "UPDATE diet_plan_requests
             SET status = 'in_progress', nutritionist_id = $2, updated_at = NOW()
             WHERE id = $1 AND status = 'pending'
             RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(request_id)
        .bind(nutritionist_id)
        .fetch_optional(&self.db)
        .await?;

        match claimed {
            Some(claimed) => {
                info!(request_id = %request_id, nutritionist_id = %nutritionist_id, "diet request claimed");
                Ok(claimed)
            }
            None => {
                let current = self.load(request_id).await?;
                Err(AppError::conflict(format!(
                    "Cannot claim a request that is {:?}",
                    current.status
                )))
            }
        }
    }

    pub async fn respond(
        &self,
        actor: &UserSession,
        request_id: Uuid,
        response: RespondDietRequest,
    ) -> AppResult<DietPlanRequest> {
        response.validate()?;

        let mut tx = self.db.begin().await?;
        let current = sqlx::query_as::<_, DietPlanRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM diet_plan_requests WHERE id = $1 FOR UPDATE"
        ))
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Diet plan request {request_id} not found")))?;

        if current.status != DietRequestStatus::InProgress {
            return Err(AppError::conflict(format!(
                "Cannot respond to a request that is {:?}",
                current.status
            )));
        }
        if current.nutritionist_id != Some(actor.user_id) {
            return Err(AppError::forbidden("Only the assigned nutritionist can respond"));
        }

        let completed = sqlx::query_as::<_, DietPlanRequest>(&format!(
            "UPDATE diet_plan_requests
             SET status = 'completed', plan_details = $2, daily_calories = $3,
                 response_notes = $4, updated_at = NOW()
             WHERE id = $1
             RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(request_id)
        .bind(response.plan_details.trim())
        .bind(response.daily_calories)
        .bind(&response.response_notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(request_id = %request_id, daily_calories = response.daily_calories, "diet plan delivered");
        Ok(completed)
    }

    pub async fn reject(
        &self,
        actor: &UserSession,
        request_id: Uuid,
        rejection: RejectDietRequest,
    ) -> AppResult<DietPlanRequest> {
        rejection.validate()?;

        let mut tx = self.db.begin().await?;
        let current = sqlx::query_as::<_, DietPlanRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM diet_plan_requests WHERE id = $1 FOR UPDATE"
        ))
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Diet plan request {request_id} not found")))?;

        if !current.status.is_open() {
            return Err(AppError::conflict(format!(
                "Cannot reject a request that is {:?}",
                current.status
            )));
        }
        if current.nutritionist_id.is_some_and(|assigned| assigned != actor.user_id) {
            return Err(AppError::forbidden("Request is assigned to another nutritionist"));
        }

        let rejected = sqlx::query_as::<_, DietPlanRequest>(&format!(
            "UPDATE diet_plan_requests
             SET status = 'rejected', nutritionist_id = $2, response_notes = $3, updated_at = NOW()
             WHERE id = $1
             RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(request_id)
        .bind(actor.user_id)
        .bind(rejection.response_notes.trim())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(request_id = %request_id, "diet plan request rejected");
        Ok(rejected)
    }

    async fn load(&self, request_id: Uuid) -> AppResult<DietPlanRequest> {
        sqlx::query_as::<_, DietPlanRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM diet_plan_requests WHERE id = $1"
        ))
        .bind(request_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Diet plan request {request_id} not found")))
    }
}

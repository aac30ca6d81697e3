use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use uuid::Uuid;

use super::state::AppState;
use crate::auth::{MessageResponse, UserRole, UserSession};
use crate::error::AppError;
use crate::models::{CreateMembershipPlanRequest, MembershipPlan, UpdateMembershipPlanRequest};

/// Membership plan catalogue. Reads are public.
pub fn membership_plan_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_plans).post(create_plan))
        .route("/:id", get(get_plan).put(update_plan).delete(deactivate_plan))
}

#[tracing::instrument(skip(state))]
async fn list_plans(State(state): State<AppState>) -> Result<Json<Vec<MembershipPlan>>, AppError> {
    let plans = state.membership_plans.list_active().await?;
    Ok(Json(plans))
}

#[tracing::instrument(skip(state))]
async fn get_plan(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<MembershipPlan>, AppError> {
    let plan = state.membership_plans.get(id).await?;
    Ok(Json(plan))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn create_plan(
    State(state): State<AppState>,
    session: UserSession,
    Json(request): Json<CreateMembershipPlanRequest>,
) -> Result<(StatusCode, Json<MembershipPlan>), AppError> {
    session.require(&[UserRole::Admin])?;
    let plan = state.membership_plans.create(request).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn update_plan(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateMembershipPlanRequest>,
) -> Result<Json<MembershipPlan>, AppError> {
    session.require(&[UserRole::Admin])?;
    let plan = state.membership_plans.update(id, request).await?;
    Ok(Json(plan))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn deactivate_plan(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    session.require(&[UserRole::Admin])?;
    state.membership_plans.deactivate(id).await?;
    Ok(Json(MessageResponse::new("Membership plan deactivated")))
}

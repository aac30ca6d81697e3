use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

use super::state::AppState;
use crate::auth::{MessageResponse, UserRole, UserSession};
use crate::error::AppError;
use crate::models::{
    ApprovalResult, CreateMonthlyPlanRequest, MonthlyPlanDetail, MonthlyPlanSlot,
    MonthlyPlanSummary, SubscribeRequest, Subscription, SubscriptionSummary, SubscriptionWithSlots,
    UpdateMonthlyPlanRequest,
};

const PLAN_MANAGERS: &[UserRole] = &[UserRole::Trainer];

/// Recurring trainer packages and their subscriptions
pub fn monthly_plans_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_plans).post(create_plan))
        .route("/subscriptions/me", get(my_subscriptions))
        .route("/subscriptions/pending", get(pending_subscriptions))
        .route("/subscriptions/:id/approve", post(approve_subscription))
        .route("/subscriptions/:id/reject", post(reject_subscription))
        .route("/subscriptions/:id/cancel", post(cancel_subscription))
        .route("/slots/me", get(my_slots))
        .route("/:id", get(get_plan).put(update_plan).delete(deactivate_plan))
        .route("/:id/subscribe", post(subscribe))
}

#[tracing::instrument(skip(state))]
async fn list_plans(State(state): State<AppState>) -> Result<Json<Vec<MonthlyPlanSummary>>, AppError> {
    let plans = state.monthly_plans.list_active().await?;
    Ok(Json(plans))
}

#[tracing::instrument(skip(state))]
async fn get_plan(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<MonthlyPlanDetail>, AppError> {
    let plan = state.monthly_plans.get(id).await?;
    Ok(Json(plan))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn create_plan(
    State(state): State<AppState>,
    session: UserSession,
    Json(request): Json<CreateMonthlyPlanRequest>,
) -> Result<(StatusCode, Json<MonthlyPlanDetail>), AppError> {
    // The caller becomes the plan's trainer
    if session.role != UserRole::Trainer {
        return Err(AppError::forbidden("Only trainers can create monthly plans"));
    }
    let plan = state.monthly_plans.create(session.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn update_plan(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateMonthlyPlanRequest>,
) -> Result<Json<MonthlyPlanDetail>, AppError> {
    session.require(PLAN_MANAGERS)?;
    let plan = state.monthly_plans.update(&session, id, request).await?;
    Ok(Json(plan))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn deactivate_plan(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    session.require(PLAN_MANAGERS)?;
    state.monthly_plans.deactivate(&session, id).await?;
    Ok(Json(MessageResponse::new("Monthly plan deactivated")))
}

#[tracing::instrument(skip(state, session, body), fields(user_id = %session.user_id))]
async fn subscribe(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
    body: Option<Json<SubscribeRequest>>,
) -> Result<(StatusCode, Json<Subscription>), AppError> {
    session.require(&[UserRole::Member])?;
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let subscription = state.monthly_plans.subscribe(session.user_id, id, request).await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn my_subscriptions(
    State(state): State<AppState>,
    session: UserSession,
) -> Result<Json<Vec<SubscriptionWithSlots>>, AppError> {
    session.require(&[UserRole::Member])?;
    let subscriptions = state.monthly_plans.member_subscriptions(session.user_id).await?;
    Ok(Json(subscriptions))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn pending_subscriptions(
    State(state): State<AppState>,
    session: UserSession,
) -> Result<Json<Vec<SubscriptionSummary>>, AppError> {
    session.require(PLAN_MANAGERS)?;
    let pending = state.monthly_plans.pending_subscriptions(&session).await?;
    Ok(Json(pending))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn approve_subscription(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
) -> Result<Json<ApprovalResult>, AppError> {
    session.require(PLAN_MANAGERS)?;
    let approval = state.monthly_plans.approve(&session, id).await?;
    Ok(Json(approval))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn reject_subscription(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
) -> Result<Json<Subscription>, AppError> {
    session.require(PLAN_MANAGERS)?;
    let subscription = state.monthly_plans.reject(&session, id).await?;
    Ok(Json(subscription))
}

/// Members cancel their own, trainers those on their plans
#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn cancel_subscription(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
) -> Result<Json<Subscription>, AppError> {
    session.require(&[UserRole::Member, UserRole::Trainer])?;
    let subscription = state.monthly_plans.cancel(&session, id).await?;
    Ok(Json(subscription))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn my_slots(
    State(state): State<AppState>,
    session: UserSession,
) -> Result<Json<Vec<MonthlyPlanSlot>>, AppError> {
    session.require(&[UserRole::Member, UserRole::Trainer])?;
    let slots = state.monthly_plans.upcoming_slots(&session).await?;
    Ok(Json(slots))
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

use super::state::AppState;
use crate::auth::{UserRole, UserSession};
use crate::error::AppError;
use crate::models::{
    CreateMemberRequest, MemberListQuery, MemberProfile, MemberSummary, MembershipActionRequest,
    MembershipPlanRequest, UpdateMemberProfileRequest,
};

const DESK: &[UserRole] = &[UserRole::FrontDesk];
const MEMBER_VIEWERS: &[UserRole] = &[UserRole::FrontDesk, UserRole::Trainer, UserRole::Nutritionist];

pub fn members_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_members).post(create_member))
        .route("/pending", get(list_pending))
        .route("/me", get(my_profile).put(update_my_profile))
        .route("/me/membership", post(request_membership))
        .route("/:id", get(get_member))
        .route("/:id/membership", post(membership_action))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn list_members(
    State(state): State<AppState>,
    session: UserSession,
    Query(query): Query<MemberListQuery>,
) -> Result<Json<Vec<MemberSummary>>, AppError> {
    session.require(DESK)?;
    let members = state.members.list_members(&query).await?;
    Ok(Json(members))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn list_pending(
    State(state): State<AppState>,
    session: UserSession,
) -> Result<Json<Vec<MemberSummary>>, AppError> {
    session.require(DESK)?;
    let members = state.members.list_pending().await?;
    Ok(Json(members))
}

/// Desk sign-up: the membership is active from today
#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn create_member(
    State(state): State<AppState>,
    session: UserSession,
    Json(request): Json<CreateMemberRequest>,
) -> Result<(StatusCode, Json<MemberSummary>), AppError> {
    session.require(DESK)?;
    let member = state.members.create_member(request).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn my_profile(
    State(state): State<AppState>,
    session: UserSession,
) -> Result<Json<MemberProfile>, AppError> {
    session.require(&[UserRole::Member])?;
    let profile = state.members.get_profile(session.user_id).await?;
    Ok(Json(profile))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn update_my_profile(
    State(state): State<AppState>,
    session: UserSession,
    Json(request): Json<UpdateMemberProfileRequest>,
) -> Result<Json<MemberProfile>, AppError> {
    session.require(&[UserRole::Member])?;
    let profile = state.members.update_profile(session.user_id, request).await?;
    Ok(Json(profile))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn request_membership(
    State(state): State<AppState>,
    session: UserSession,
    Json(request): Json<MembershipPlanRequest>,
) -> Result<Json<MemberProfile>, AppError> {
    session.require(&[UserRole::Member])?;
    let profile = state
        .members
        .request_plan(session.user_id, request.membership_plan_id)
        .await?;
    Ok(Json(profile))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn get_member(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
) -> Result<Json<MemberSummary>, AppError> {
    session.require(MEMBER_VIEWERS)?;
    let member = state.members.get_member(id).await?;
    Ok(Json(member))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn membership_action(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
    Json(request): Json<MembershipActionRequest>,
) -> Result<Json<MemberProfile>, AppError> {
    session.require(DESK)?;
    let profile = state.members.apply_action(id, request).await?;
    Ok(Json(profile))
}

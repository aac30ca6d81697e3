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
    CreateDietRequest, DietPlanRequest, DietRequestListQuery, RejectDietRequest, RespondDietRequest,
};

const NUTRITION_STAFF: &[UserRole] = &[UserRole::Nutritionist];

pub fn diet_plans_routes() -> Router<AppState> {
    Router::new()
        .route("/requests", get(list_requests).post(create_request))
        .route("/requests/me", get(my_requests))
        .route("/requests/:id/claim", post(claim_request))
        .route("/requests/:id/respond", post(respond_to_request))
        .route("/requests/:id/reject", post(reject_request))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn create_request(
    State(state): State<AppState>,
    session: UserSession,
    Json(request): Json<CreateDietRequest>,
) -> Result<(StatusCode, Json<DietPlanRequest>), AppError> {
    session.require(&[UserRole::Member])?;
    let created = state.diet_plans.create(session.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn my_requests(
    State(state): State<AppState>,
    session: UserSession,
) -> Result<Json<Vec<DietPlanRequest>>, AppError> {
    session.require(&[UserRole::Member])?;
    let requests = state.diet_plans.member_requests(session.user_id).await?;
    Ok(Json(requests))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn list_requests(
    State(state): State<AppState>,
    session: UserSession,
    Query(query): Query<DietRequestListQuery>,
) -> Result<Json<Vec<DietPlanRequest>>, AppError> {
    session.require(NUTRITION_STAFF)?;
    let requests = state.diet_plans.list(&query).await?;
    Ok(Json(requests))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn claim_request(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
) -> Result<Json<DietPlanRequest>, AppError> {
    session.require(NUTRITION_STAFF)?;
    let claimed = state.diet_plans.claim(session.user_id, id).await?;
    Ok(Json(claimed))
}

#[tracing::instrument(skip(state, session, response), fields(user_id = %session.user_id))]
async fn respond_to_request(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
    Json(response): Json<RespondDietRequest>,
) -> Result<Json<DietPlanRequest>, AppError> {
    session.require(NUTRITION_STAFF)?;
    let completed = state.diet_plans.respond(&session, id, response).await?;
    Ok(Json(completed))
}

#[tracing::instrument(skip(state, session, rejection), fields(user_id = %session.user_id))]
async fn reject_request(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
    Json(rejection): Json<RejectDietRequest>,
) -> Result<Json<DietPlanRequest>, AppError> {
    session.require(NUTRITION_STAFF)?;
    let rejected = state.diet_plans.reject(&session, id, rejection).await?;
    Ok(Json(rejected))
}

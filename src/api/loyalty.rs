use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

use super::state::AppState;
use crate::auth::{UserRole, UserSession};
use crate::error::AppError;
use crate::models::{AdjustPointsRequest, LoyaltySummary};

pub fn loyalty_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(my_points))
        .route("/member/:id", get(member_points))
        .route("/adjust", post(adjust_points))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn my_points(State(state): State<AppState>, session: UserSession) -> Result<Json<LoyaltySummary>, AppError> {
    session.require(&[UserRole::Member])?;
    let summary = state.loyalty.summary(session.user_id).await?;
    Ok(Json(summary))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn member_points(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
) -> Result<Json<LoyaltySummary>, AppError> {
    session.require(&[UserRole::FrontDesk])?;
    let summary = state.loyalty.summary(id).await?;
    Ok(Json(summary))
}

/// Manual correction, positive or negative
#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn adjust_points(
    State(state): State<AppState>,
    session: UserSession,
    Json(request): Json<AdjustPointsRequest>,
) -> Result<Json<LoyaltySummary>, AppError> {
    session.require(&[UserRole::Admin])?;
    let summary = state.loyalty.adjust(request).await?;
    Ok(Json(summary))
}

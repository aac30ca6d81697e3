use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use uuid::Uuid;

use super::state::AppState;
use crate::auth::{jwt_auth_middleware, require_role, UserRole, UserSession};
use crate::error::AppError;
use crate::models::{
    ActiveCheckIn, CheckIn, CheckInRequest, CheckInResponse, ConsistencyQuery, ConsistencyReport,
    HistoryQuery,
};

/// Front desk operations plus the member's own history
pub fn check_ins_routes(state: &AppState) -> Router<AppState> {
    let desk = Router::new()
        .route("/", post(check_in))
        .route("/active", get(active_check_ins))
        .route("/member/:id", get(member_history))
        .route("/:id/checkout", post(check_out))
        .route_layer(middleware::from_fn(require_role(&[UserRole::FrontDesk])))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            jwt_auth_middleware,
        ));

    let member = Router::new()
        .route("/me", get(my_history))
        .route("/me/consistency", get(my_consistency));

    desk.merge(member)
}

#[tracing::instrument(skip(state, desk), fields(desk_id = %desk.user_id))]
async fn check_in(
    State(state): State<AppState>,
    Extension(desk): Extension<UserSession>,
    Json(request): Json<CheckInRequest>,
) -> Result<(StatusCode, Json<CheckInResponse>), AppError> {
    let response = state.check_ins.check_in(&desk, request.member_id).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[tracing::instrument(skip(state))]
async fn check_out(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<CheckIn>, AppError> {
    let closed = state.check_ins.check_out(id).await?;
    Ok(Json(closed))
}

#[tracing::instrument(skip(state))]
async fn active_check_ins(State(state): State<AppState>) -> Result<Json<Vec<ActiveCheckIn>>, AppError> {
    let active = state.check_ins.active().await?;
    Ok(Json(active))
}

#[tracing::instrument(skip(state))]
async fn member_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<CheckIn>>, AppError> {
    let history = state.check_ins.history(id, &query).await?;
    Ok(Json(history))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn my_history(
    State(state): State<AppState>,
    session: UserSession,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<CheckIn>>, AppError> {
    session.require(&[UserRole::Member])?;
    let history = state.check_ins.history(session.user_id, &query).await?;
    Ok(Json(history))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn my_consistency(
    State(state): State<AppState>,
    session: UserSession,
    Query(query): Query<ConsistencyQuery>,
) -> Result<Json<ConsistencyReport>, AppError> {
    session.require(&[UserRole::Member])?;
    let report = state
        .check_ins
        .consistency_report(session.user_id, query.weeks)
        .await?;
    Ok(Json(report))
}

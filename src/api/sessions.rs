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
use crate::models::{BookSessionRequest, SessionListQuery, TrainingSession};
use crate::services::training_session_service::SessionTransition;

/// One-off trainer sessions
pub fn sessions_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(book_session))
        .route("/me", get(my_sessions))
        .route("/:id/complete", post(complete_session))
        .route("/:id/cancel", post(cancel_session))
        .route("/:id/no-show", post(mark_no_show))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn book_session(
    State(state): State<AppState>,
    session: UserSession,
    Json(request): Json<BookSessionRequest>,
) -> Result<(StatusCode, Json<TrainingSession>), AppError> {
    session.require(&[UserRole::Member])?;
    let booked = state.sessions.book(session.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(booked)))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn my_sessions(
    State(state): State<AppState>,
    session: UserSession,
    Query(query): Query<SessionListQuery>,
) -> Result<Json<Vec<TrainingSession>>, AppError> {
    session.require(&[UserRole::Member, UserRole::Trainer])?;
    let sessions = state.sessions.list_for(&session, &query).await?;
    Ok(Json(sessions))
}

async fn apply(
    state: &AppState,
    session: &UserSession,
    id: Uuid,
    transition: SessionTransition,
) -> Result<Json<TrainingSession>, AppError> {
    let updated = state.sessions.transition(session, id, transition).await?;
    Ok(Json(updated))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn complete_session(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
) -> Result<Json<TrainingSession>, AppError> {
    apply(&state, &session, id, SessionTransition::Complete).await
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn cancel_session(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
) -> Result<Json<TrainingSession>, AppError> {
    apply(&state, &session, id, SessionTransition::Cancel).await
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn mark_no_show(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
) -> Result<Json<TrainingSession>, AppError> {
    apply(&state, &session, id, SessionTransition::NoShow).await
}

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, put},
    Router,
};
use uuid::Uuid;

use super::state::AppState;
use crate::auth::{UserRole, UserSession};
use crate::error::AppError;
use crate::models::{
    AvailabilityQuery, ReplaceScheduleRequest, TrainerAvailability, TrainerCard, TrainerDetail,
    TrainerScheduleEntry, UpdateTrainerRequest,
};
use crate::services::trainer_service::TrainerRemoval;

pub fn trainers_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_trainers))
        .route("/me", put(update_my_profile))
        .route("/me/schedule", put(replace_my_schedule))
        .route("/:id", get(get_trainer).delete(delete_trainer))
        .route("/:id/availability", get(availability))
}

#[tracing::instrument(skip(state))]
async fn list_trainers(State(state): State<AppState>) -> Result<Json<Vec<TrainerCard>>, AppError> {
    let trainers = state.trainers.list_trainers().await?;
    Ok(Json(trainers))
}

#[tracing::instrument(skip(state))]
async fn get_trainer(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<TrainerDetail>, AppError> {
    let trainer = state.trainers.get_trainer(id).await?;
    Ok(Json(trainer))
}

/// Free intervals on a date: availability windows minus booked sessions and plan slots
#[tracing::instrument(skip(state))]
async fn availability(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<TrainerAvailability>, AppError> {
    let availability = state.trainers.availability(id, query.date).await?;
    Ok(Json(availability))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn update_my_profile(
    State(state): State<AppState>,
    session: UserSession,
    Json(request): Json<UpdateTrainerRequest>,
) -> Result<Json<TrainerCard>, AppError> {
    session.require(&[UserRole::Trainer])?;
    let trainer = state.trainers.update_profile(session.user_id, request).await?;
    Ok(Json(trainer))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn replace_my_schedule(
    State(state): State<AppState>,
    session: UserSession,
    Json(request): Json<ReplaceScheduleRequest>,
) -> Result<Json<Vec<TrainerScheduleEntry>>, AppError> {
    session.require(&[UserRole::Trainer])?;
    let schedule = state.trainers.replace_schedule(session.user_id, request).await?;
    Ok(Json(schedule))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn delete_trainer(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
) -> Result<Json<TrainerRemoval>, AppError> {
    session.require(&[UserRole::Admin])?;
    let removal = state.trainers.delete_trainer(id).await?;
    Ok(Json(removal))
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use uuid::Uuid;

use super::state::AppState;
use crate::auth::{MessageResponse, UserRole, UserSession};
use crate::error::AppError;
use crate::models::{
    BookingSummary, CreateFacilityRequest, Facility, FacilityAvailability, FacilityBooking,
    FacilityDetail, FacilitySlotView, GenerateSlotsRequest, GenerateSlotsResponse,
    ReplaceAvailabilityRequest, SlotDateQuery, UpdateFacilityRequest,
};

pub fn facilities_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_facilities).post(create_facility))
        .route("/bookings/me", get(my_bookings))
        .route("/bookings/:id/cancel", post(cancel_booking))
        .route("/slots/:slot_id/book", post(book_slot))
        .route("/:id", get(get_facility).put(update_facility).delete(deactivate_facility))
        .route("/:id/availability", put(replace_availability))
        .route("/:id/slots", get(slots_on))
        .route("/:id/slots/generate", post(generate_slots))
}

#[tracing::instrument(skip(state))]
async fn list_facilities(State(state): State<AppState>) -> Result<Json<Vec<Facility>>, AppError> {
    let facilities = state.facilities.list_active().await?;
    Ok(Json(facilities))
}

#[tracing::instrument(skip(state))]
async fn get_facility(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<FacilityDetail>, AppError> {
    let facility = state.facilities.get(id).await?;
    Ok(Json(facility))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn create_facility(
    State(state): State<AppState>,
    session: UserSession,
    Json(request): Json<CreateFacilityRequest>,
) -> Result<(StatusCode, Json<Facility>), AppError> {
    session.require(&[UserRole::Admin])?;
    let facility = state.facilities.create(request).await?;
    Ok((StatusCode::CREATED, Json(facility)))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn update_facility(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateFacilityRequest>,
) -> Result<Json<Facility>, AppError> {
    session.require(&[UserRole::Admin])?;
    let facility = state.facilities.update(id, request).await?;
    Ok(Json(facility))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn deactivate_facility(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    session.require(&[UserRole::Admin])?;
    state.facilities.deactivate(id).await?;
    Ok(Json(MessageResponse::new("Facility deactivated")))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn replace_availability(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
    Json(request): Json<ReplaceAvailabilityRequest>,
) -> Result<Json<Vec<FacilityAvailability>>, AppError> {
    session.require(&[UserRole::Admin])?;
    let availability = state.facilities.replace_availability(id, request).await?;
    Ok(Json(availability))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn generate_slots(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
    Json(request): Json<GenerateSlotsRequest>,
) -> Result<Json<GenerateSlotsResponse>, AppError> {
    session.require(&[UserRole::Admin])?;
    let outcome = state.facilities.generate_slots(id, request).await?;
    Ok(Json(outcome))
}

#[tracing::instrument(skip(state))]
async fn slots_on(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<SlotDateQuery>,
) -> Result<Json<Vec<FacilitySlotView>>, AppError> {
    let slots = state.facilities.slots_on(id, query.date).await?;
    Ok(Json(slots))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn book_slot(
    State(state): State<AppState>,
    session: UserSession,
    Path(slot_id): Path<Uuid>,
) -> Result<(StatusCode, Json<FacilityBooking>), AppError> {
    session.require(&[UserRole::Member])?;
    let booking = state.facilities.book(session.user_id, slot_id).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn cancel_booking(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
) -> Result<Json<FacilityBooking>, AppError> {
    let booking = state.facilities.cancel_booking(&session, id).await?;
    Ok(Json(booking))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn my_bookings(
    State(state): State<AppState>,
    session: UserSession,
) -> Result<Json<Vec<BookingSummary>>, AppError> {
    session.require(&[UserRole::Member])?;
    let bookings = state.facilities.member_bookings(session.user_id).await?;
    Ok(Json(bookings))
}

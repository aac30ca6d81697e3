use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::get,
    Extension, Router,
};
use uuid::Uuid;

use super::state::AppState;
use crate::auth::{admin_only_middleware, jwt_auth_middleware, MessageResponse, UserSession};
use crate::error::AppError;
use crate::models::{CreateUserRequest, UpdateUserRequest, UserListQuery, UserResponse};

/// Admin portal user management
pub fn users_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
        .route_layer(middleware::from_fn(admin_only_middleware))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            jwt_auth_middleware,
        ))
}

#[tracing::instrument(skip(state))]
async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = state.users.list_users(&query).await?;
    Ok(Json(users))
}

#[tracing::instrument(skip(state))]
async fn get_user(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<UserResponse>, AppError> {
    let user = state.users.get_user(id).await?;
    Ok(Json(user.into()))
}

#[tracing::instrument(skip(state, request))]
async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let user = state.users.create_user(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[tracing::instrument(skip(state, session, request), fields(admin_id = %session.user_id))]
async fn update_user(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.users.update_user(&session, id, request).await?;
    Ok(Json(user))
}

#[tracing::instrument(skip(state, session), fields(admin_id = %session.user_id))]
async fn delete_user(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state.users.delete_user(&session, id).await?;
    Ok(Json(MessageResponse::new("User deleted")))
}

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use super::state::AppState;
use crate::auth::{
    AuthError, AuthResponse, ChangePasswordRequest, LoginRequest, MessageResponse,
    RefreshTokenRequest, RegisterRequest, TokenResponse, UserSession,
};
use crate::models::UserResponse;

/// Authentication routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh_token))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/change-password", post(change_password))
}

/// Register a new member
#[tracing::instrument(skip(state, request))]
async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
    let response = state.auth.register(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[tracing::instrument(skip(state, request))]
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    let response = state.auth.login(request).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(state, request))]
async fn refresh_token(
    State(state): State<AppState>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    let response = state.auth.refresh_token(request).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(state, bearer))]
async fn logout(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<MessageResponse>, AuthError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(AuthError::MissingAuthHeader)?;
    let response = state.auth.logout(bearer.token()).await?;
    Ok(Json(response))
}

/// Current user, loaded fresh from the database
#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn me(State(state): State<AppState>, session: UserSession) -> Result<Json<UserResponse>, AuthError> {
    let user = state.auth.current_user(&session).await?;
    Ok(Json(user))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn change_password(
    State(state): State<AppState>,
    session: UserSession,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let response = state.auth.change_password(&session, request).await?;
    Ok(Json(response))
}

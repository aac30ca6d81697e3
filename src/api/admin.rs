use axum::{extract::State, middleware, response::Json, routing::get, Router};

use super::state::AppState;
use crate::auth::{admin_only_middleware, jwt_auth_middleware};
use crate::error::AppError;
use crate::models::AdminStats;

/// Admin dashboard
pub fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats))
        .route_layer(middleware::from_fn(admin_only_middleware))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            jwt_auth_middleware,
        ))
}

#[tracing::instrument(skip(state))]
async fn stats(State(state): State<AppState>) -> Result<Json<AdminStats>, AppError> {
    let stats = state.admin_stats.stats().await?;
    Ok(Json(stats))
}

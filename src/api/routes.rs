use axum::{middleware, routing::get, Router};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use super::admin::admin_routes;
use super::auth::auth_routes;
use super::check_ins::check_ins_routes;
use super::diet_plans::diet_plans_routes;
use super::facilities::facilities_routes;
use super::health::health_check;
use super::loyalty::loyalty_routes;
use super::members::members_routes;
use super::membership_plans::membership_plan_routes;
use super::monthly_plans::monthly_plans_routes;
use super::sessions::sessions_routes;
use super::state::AppState;
use super::store::store_routes;
use super::trainers::trainers_routes;
use super::users::users_routes;
use crate::auth::{cors_layer, security_headers_layer};
use crate::config::AppConfig;
use crate::middleware::{rate_limit_middleware, RateLimitConfig, RateLimiter};

pub fn create_routes(db: PgPool, config: AppConfig) -> Router {
    let state = AppState::new(db, config);
    build_router(state)
}

/// Assemble every route group on an existing state
pub fn build_router(state: AppState) -> Router {
    let auth_limiter = RateLimiter::new(RateLimitConfig::per_minute(
        state.config.auth_rate_limit_per_minute,
    ));

    let auth = auth_routes().route_layer(middleware::from_fn_with_state(
        auth_limiter,
        rate_limit_middleware,
    ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth)
        .nest("/api/users", users_routes(&state))
        .nest("/api/admin", admin_routes(&state))
        .nest("/api/membership-plans", membership_plan_routes())
        .nest("/api/members", members_routes())
        .nest("/api/trainers", trainers_routes())
        .nest("/api/sessions", sessions_routes())
        .nest("/api/monthly-plans", monthly_plans_routes())
        .nest("/api/facilities", facilities_routes())
        .nest("/api/store", store_routes())
        .nest("/api/diet-plans", diet_plans_routes())
        .nest("/api/check-ins", check_ins_routes(&state))
        .nest("/api/loyalty", loyalty_routes())
        .layer(TraceLayer::new_for_http())
        .layer(security_headers_layer())
        .layer(cors_layer())
        .with_state(state)
}

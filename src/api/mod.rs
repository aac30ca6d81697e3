// HTTP routes and handlers

pub mod admin;
pub mod auth;
pub mod check_ins;
pub mod diet_plans;
pub mod facilities;
pub mod health;
pub mod loyalty;
pub mod members;
pub mod membership_plans;
pub mod monthly_plans;
pub mod routes;
pub mod sessions;
pub mod state;
pub mod store;
pub mod trainers;
pub mod users;

pub use routes::{build_router, create_routes};
pub use state::AppState;

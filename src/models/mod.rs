// Database rows and request/response payloads

pub mod admin;
pub mod check_in;
pub mod diet_plan;
pub mod facility;
pub mod loyalty;
pub mod member;
pub mod membership_plan;
pub mod monthly_plan;
pub mod pagination;
pub mod store;
pub mod time_range;
pub mod trainer;
pub mod training_session;
pub mod user;
pub mod validation;

pub use admin::*;
pub use check_in::*;
pub use diet_plan::*;
pub use facility::*;
pub use loyalty::*;
pub use member::*;
pub use membership_plan::*;
pub use monthly_plan::*;
pub use pagination::Page;
pub use store::*;
pub use time_range::TimeRange;
pub use trainer::*;
pub use training_session::*;
pub use user::*;
pub use validation::*;

// Business logic services

pub mod admin_stats_service;
pub mod background_job_service;
pub mod check_in_service;
pub mod diet_plan_service;
pub mod facility_service;
pub mod loyalty_service;
pub mod member_service;
pub mod membership_plan_service;
pub mod monthly_plan_service;
pub mod slot_generation;
pub mod store_service;
pub mod trainer_service;
pub mod training_session_service;
pub mod user_service;

pub use admin_stats_service::AdminStatsService;
pub use background_job_service::{BackgroundJobService, MaintenanceReport, MaintenanceTasks};
pub use check_in_service::CheckInService;
pub use diet_plan_service::DietPlanService;
pub use facility_service::FacilityService;
pub use loyalty_service::LoyaltyService;
pub use member_service::MemberService;
pub use membership_plan_service::MembershipPlanService;
pub use monthly_plan_service::MonthlyPlanService;
pub use store_service::StoreService;
pub use trainer_service::TrainerService;
pub use training_session_service::TrainingSessionService;
pub use user_service::UserService;

use axum::extract::FromRef;
use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::services::{
    AdminStatsService, CheckInService, DietPlanService, FacilityService, LoyaltyService,
    MaintenanceTasks, MemberService, MembershipPlanService, MonthlyPlanService, StoreService,
    TrainerService, TrainingSessionService, UserService,
};

/// Shared handler state. Every service is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub auth: AuthService,
    pub users: UserService,
    pub members: MemberService,
    pub membership_plans: MembershipPlanService,
    pub trainers: TrainerService,
    pub sessions: TrainingSessionService,
    pub monthly_plans: MonthlyPlanService,
    pub facilities: FacilityService,
    pub store: StoreService,
    pub diet_plans: DietPlanService,
    pub check_ins: CheckInService,
    pub loyalty: LoyaltyService,
    pub admin_stats: AdminStatsService,
}

impl AppState {
    pub fn new(db: PgPool, config: AppConfig) -> Self {
        let loyalty_rules = config.loyalty.clone();

        Self {
            auth: AuthService::new(db.clone(), &config),
            users: UserService::new(db.clone()),
            members: MemberService::new(db.clone()),
            membership_plans: MembershipPlanService::new(db.clone()),
            trainers: TrainerService::new(db.clone()),
            sessions: TrainingSessionService::new(db.clone()),
            monthly_plans: MonthlyPlanService::new(db.clone()),
            facilities: FacilityService::new(db.clone()),
            store: StoreService::new(db.clone(), loyalty_rules.clone()),
            diet_plans: DietPlanService::new(db.clone()),
            check_ins: CheckInService::new(db.clone(), loyalty_rules),
            loyalty: LoyaltyService::new(db.clone()),
            admin_stats: AdminStatsService::new(db.clone()),
            config: Arc::new(config),
            db,
        }
    }

    pub fn maintenance_tasks(&self) -> MaintenanceTasks {
        MaintenanceTasks::new(self.members.clone(), self.monthly_plans.clone(), self.auth.clone())
    }
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

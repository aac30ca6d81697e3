use anyhow::{Context, Result};
use chrono::NaiveTime;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::UserRole;
use crate::config::LoyaltyConfig;
use crate::models::*;
use crate::services::*;

/// Password shared by every demo account
pub const DEMO_PASSWORD: &str = "Finova#2024";

const BASIC_PLAN: &str = "Basic Monthly";
const PREMIUM_PLAN: &str = "Premium Annual";
const DEMO_FACILITY: &str = "Main Gym Floor";

pub struct DatabaseSeeder {
    pool: PgPool,
}

impl DatabaseSeeder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create demo data. Safe to run on every start.
    pub async fn seed_all(&self) -> Result<()> {
        tracing::info!("Starting database seeding...");

        let basic_plan = self.seed_membership_plans().await?;
        self.seed_staff().await?;
        self.seed_member(basic_plan).await?;
        self.seed_facility().await?;
        self.seed_store_items().await?;

        tracing::info!("Database seeding completed!");
        Ok(())
    }

    /// Returns the id of the basic plan
    async fn seed_membership_plans(&self) -> Result<Uuid> {
        let plan_service = MembershipPlanService::new(self.pool.clone());

        let plans = [
            CreateMembershipPlanRequest {
                name: BASIC_PLAN.to_string(),
                description: Some("Gym floor access, one month".to_string()),
                duration_months: 1,
                price_cents: 4_999,
            },
            CreateMembershipPlanRequest {
                name: PREMIUM_PLAN.to_string(),
                description: Some("All facilities for twelve months".to_string()),
                duration_months: 12,
                price_cents: 49_999,
            },
        ];

        for plan in plans {
            if self.id_by_name("membership_plans", &plan.name).await?.is_none() {
                let created = plan_service.create(plan).await?;
                tracing::info!(plan = %created.name, "Created membership plan");
            }
        }

        self.id_by_name("membership_plans", BASIC_PLAN)
            .await?
            .context("basic membership plan missing after seeding")
    }

    async fn seed_staff(&self) -> Result<()> {
        let user_service = UserService::new(self.pool.clone());
        let trainer_service = TrainerService::new(self.pool.clone());

        let staff = [
            ("admin@finova.fit", "Avery Admin", UserRole::Admin, None),
            ("desk@finova.fit", "Dana Desk", UserRole::FrontDesk, None),
            ("coach@finova.fit", "Tariq Trainer", UserRole::Trainer, Some("Strength & conditioning")),
            ("nutrition@finova.fit", "Nia Nutrition", UserRole::Nutritionist, None),
        ];

        for (email, full_name, role, specialization) in staff {
            if user_service.find_by_email(email).await?.is_some() {
                continue;
            }

            let user = user_service
                .create_user(CreateUserRequest {
                    email: email.to_string(),
                    password: DEMO_PASSWORD.to_string(),
                    full_name: full_name.to_string(),
                    phone: None,
                    role,
                    specialization: specialization.map(str::to_string),
                    hourly_rate_cents: specialization.map(|_| 6_000),
                })
                .await?;
            tracing::info!(email, role = role.as_str(), "Created demo user");

            if role == UserRole::Trainer {
                trainer_service
                    .replace_schedule(user.id, ReplaceScheduleRequest { windows: weekday_windows(7, 12) })
                    .await?;
            }
        }

        Ok(())
    }

    async fn seed_member(&self, plan_id: Uuid) -> Result<()> {
        let user_service = UserService::new(self.pool.clone());
        let member_service = MemberService::new(self.pool.clone());

        let email = "member@finova.fit";
        if user_service.find_by_email(email).await?.is_none() {
            member_service
                .create_member(CreateMemberRequest {
                    email: email.to_string(),
                    password: DEMO_PASSWORD.to_string(),
                    full_name: "Morgan Member".to_string(),
                    phone: Some("+15550100".to_string()),
                    membership_plan_id: plan_id,
                })
                .await?;
            tracing::info!(email, "Created demo member");
        }

        Ok(())
    }

    async fn seed_facility(&self) -> Result<()> {
        if self.id_by_name("facilities", DEMO_FACILITY).await?.is_some() {
            return Ok(());
        }

        let facility_service = FacilityService::new(self.pool.clone());
        let facility = facility_service
            .create(CreateFacilityRequest {
                name: DEMO_FACILITY.to_string(),
                description: Some("Free weights and machines".to_string()),
                capacity: 25,
            })
            .await?;

        let windows = (0..5)
            .map(|day| AvailabilityWindow {
                day_of_week: day,
                open_time: time(6),
                close_time: time(22),
                slot_duration_minutes: 60,
            })
            .collect();
        facility_service
            .replace_availability(facility.id, ReplaceAvailabilityRequest { windows })
            .await?;

        tracing::info!(facility = %facility.name, "Created demo facility");
        Ok(())
    }

    async fn seed_store_items(&self) -> Result<()> {
        let store_service = StoreService::new(self.pool.clone(), LoyaltyConfig::default());

        let items = [
            ("Whey Protein 1kg", "supplements", 3_499, 40),
            ("Shaker Bottle", "accessories", 999, 100),
            ("Finova Training Tee", "apparel", 2_499, 60),
        ];

        for (name, category, price_cents, stock_quantity) in items {
            if self.id_by_name("store_items", name).await?.is_some() {
                continue;
            }

            store_service
                .create_item(CreateStoreItemRequest {
                    name: name.to_string(),
                    description: None,
                    category: category.to_string(),
                    price_cents,
                    stock_quantity,
                    image_url: None,
                })
                .await?;
            tracing::info!(item = name, "Created store item");
        }

        Ok(())
    }

    async fn id_by_name(&self, table: &str, name: &str) -> Result<Option<Uuid>> {
        let id = sqlx::query_scalar(&format!("SELECT id FROM {table} WHERE name = $1 LIMIT 1"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }
}

fn time(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Monday to Friday, one window per day
fn weekday_windows(start_hour: u32, end_hour: u32) -> Vec<ScheduleWindow> {
    (0..5)
        .map(|day| ScheduleWindow {
            day_of_week: day,
            start_time: time(start_hour),
            end_time: time(end_hour),
        })
        .collect()
}

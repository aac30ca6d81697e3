use anyhow::{bail, Result};
use std::env;
use std::str::FromStr;

const DEV_JWT_SECRET: &str = "finova-dev-secret-change-in-production";

/// Loyalty rules shared by check-ins and the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoyaltyConfig {
    /// Distinct check-in days within one ISO week needed to earn consistency points
    pub consistency_required_days: u32,
    pub consistency_points: i64,
    pub points_per_dollar: i64,
}

impl Default for LoyaltyConfig {
    fn default() -> Self {
        Self {
            consistency_required_days: 3,
            consistency_points: 50,
            points_per_dollar: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub log_level: String,
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub auth_rate_limit_per_minute: u32,
    pub seed_demo_data: bool,
    pub loyalty: LoyaltyConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: "development".to_string(),
            log_level: "info".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            access_token_ttl_minutes: 60,
            refresh_token_ttl_days: 30,
            auth_rate_limit_per_minute: 20,
            seed_demo_data: false,
            loyalty: LoyaltyConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = AppConfig::default();

        let config = AppConfig {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env_or("PORT", defaults.port),
            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            jwt_secret: env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            access_token_ttl_minutes: env_or(
                "ACCESS_TOKEN_TTL_MINUTES",
                defaults.access_token_ttl_minutes,
            ),
            refresh_token_ttl_days: env_or("REFRESH_TOKEN_TTL_DAYS", defaults.refresh_token_ttl_days),
            auth_rate_limit_per_minute: env_or(
                "AUTH_RATE_LIMIT_PER_MINUTE",
                defaults.auth_rate_limit_per_minute,
            ),
            seed_demo_data: env_or("SEED_DEMO_DATA", defaults.seed_demo_data),
            loyalty: LoyaltyConfig {
                consistency_required_days: env_or(
                    "CONSISTENCY_REQUIRED_DAYS",
                    defaults.loyalty.consistency_required_days,
                ),
                consistency_points: env_or("CONSISTENCY_POINTS", defaults.loyalty.consistency_points),
                points_per_dollar: env_or("POINTS_PER_DOLLAR", defaults.loyalty.points_per_dollar),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_production() && self.jwt_secret == DEV_JWT_SECRET {
            bail!("JWT_SECRET must be set in production");
        }
        if self.access_token_ttl_minutes <= 0 || self.refresh_token_ttl_days <= 0 {
            bail!("token lifetimes must be positive");
        }
        if !(1..=7).contains(&self.loyalty.consistency_required_days) {
            bail!("CONSISTENCY_REQUIRED_DAYS must be between 1 and 7");
        }
        if self.loyalty.consistency_points < 0 || self.loyalty.points_per_dollar < 0 {
            bail!("loyalty point values cannot be negative");
        }
        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

// Application, database and seeding configuration

pub mod app;
pub mod database;
pub mod seeding;

pub use app::{AppConfig, LoyaltyConfig};
pub use database::{run_migrations, DatabaseConfig};
pub use seeding::DatabaseSeeder;

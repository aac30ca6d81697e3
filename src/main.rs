use std::net::SocketAddr;

use anyhow::Context;
use finova_fitness::api::{build_router, AppState};
use finova_fitness::config::{run_migrations, AppConfig, DatabaseConfig, DatabaseSeeder};
use finova_fitness::services::BackgroundJobService;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("loading configuration")?;

    // RUST_LOG wins over LOG_LEVEL
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("finova_fitness={0},tower_http={0}", config.log_level)))
        .unwrap_or_else(|_| EnvFilter::new("finova_fitness=info,tower_http=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db_config = DatabaseConfig::from_env()?;
    let pool = db_config
        .create_pool()
        .await
        .context("connecting to the database")?;
    run_migrations(&pool).await.context("running migrations")?;
    info!("Database migrations applied");

    if config.seed_demo_data {
        DatabaseSeeder::new(pool.clone()).seed_all().await?;
    }

    let address = config.server_address();
    let state = AppState::new(pool, config);

    let jobs = BackgroundJobService::new(state.maintenance_tasks()).await?;
    jobs.start().await?;

    let app = build_router(state);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!("Finova Fitness API listening on http://{}", address);
    info!("Health check available at http://{}/health", address);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    jobs.stop().await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

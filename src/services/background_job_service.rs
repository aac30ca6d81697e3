use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::auth::AuthService;
use crate::services::{MemberService, MonthlyPlanService};

/// Daily at 01:00 UTC
pub const MAINTENANCE_SCHEDULE: &str = "0 0 1 * * *";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub memberships_expired: u64,
    pub subscriptions_expired: u64,
    pub tokens_pruned: u64,
}

/// The housekeeping the nightly job performs
#[derive(Clone)]
pub struct MaintenanceTasks {
    members: MemberService,
    monthly_plans: MonthlyPlanService,
    auth: AuthService,
}

impl MaintenanceTasks {
    pub fn new(members: MemberService, monthly_plans: MonthlyPlanService, auth: AuthService) -> Self {
        Self {
            members,
            monthly_plans,
            auth,
        }
    }

    pub async fn run(&self) -> Result<MaintenanceReport> {
        let memberships_expired = self
            .members
            .expire_memberships()
            .await
            .context("expiring memberships")?;
        info!(count = memberships_expired, "expired memberships");

        let subscriptions_expired = self
            .monthly_plans
            .expire_subscriptions()
            .await
            .context("expiring monthly plan subscriptions")?;
        info!(count = subscriptions_expired, "expired monthly plan subscriptions");

        let tokens_pruned = self
            .auth
            .prune_blacklist()
            .await
            .context("pruning token blacklist")?;
        info!(count = tokens_pruned, "pruned expired blacklisted tokens");

        Ok(MaintenanceReport {
            memberships_expired,
            subscriptions_expired,
            tokens_pruned,
        })
    }
}

pub struct BackgroundJobService {
    scheduler: Arc<RwLock<JobScheduler>>,
    tasks: MaintenanceTasks,
}

impl BackgroundJobService {
    pub async fn new(tasks: MaintenanceTasks) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| anyhow!("Failed to create job scheduler: {}", e))?;

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            tasks,
        })
    }

    /// Register the maintenance job and start the scheduler
    pub async fn start(&self) -> Result<()> {
        self.add_maintenance_job().await?;

        let scheduler = self.scheduler.read().await;
        scheduler
            .start()
            .await
            .map_err(|e| anyhow!("Failed to start job scheduler: {}", e))?;

        info!(schedule = MAINTENANCE_SCHEDULE, "Background job scheduler started");
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        let mut scheduler = self.scheduler.write().await;
        scheduler
            .shutdown()
            .await
            .map_err(|e| anyhow!("Failed to stop job scheduler: {}", e))?;

        info!("Background job scheduler stopped");
        Ok(())
    }

    async fn add_maintenance_job(&self) -> Result<()> {
        let tasks = self.tasks.clone();

        let job = Job::new_async(MAINTENANCE_SCHEDULE, move |_uuid, _l| {
            let tasks = tasks.clone();

            Box::pin(async move {
                info!("Starting nightly maintenance");
                match tasks.run().await {
                    Ok(report) => info!(?report, "Nightly maintenance completed"),
                    Err(e) => error!("Nightly maintenance failed: {:#}", e),
                }
            })
        })
        .map_err(|e| anyhow!("Failed to create maintenance job: {}", e))?;

        let scheduler = self.scheduler.write().await;
        scheduler
            .add(job)
            .await
            .map_err(|e| anyhow!("Failed to add maintenance job to scheduler: {}", e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_parses() {
        let job = Job::new_async(MAINTENANCE_SCHEDULE, |_uuid, _l| Box::pin(async {}));
        assert!(job.is_ok());
    }
}

use chrono::Utc;
use sqlx::PgPool;

use crate::error::AppResult;
use crate::models::{AdminStats, MembershipCounts, MembershipStatus};

#[derive(Clone)]
pub struct AdminStatsService {
    db: PgPool,
}

impl AdminStatsService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Dashboard counters. Day and month boundaries are taken in UTC.
    pub async fn stats(&self) -> AppResult<AdminStats> {
        let membership_rows = sqlx::query_as::<_, (MembershipStatus, i64)>(
            "SELECT membership_status, COUNT(*) FROM member_profiles GROUP BY membership_status",
        )
        .fetch_all(&self.db)
        .await?;

        let (active_subscriptions, pending_subscriptions): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*) FILTER (WHERE status = 'active'),
                    COUNT(*) FILTER (WHERE status = 'pending')
             FROM monthly_plan_subscriptions",
        )
        .fetch_one(&self.db)
        .await?;

        let open_diet_requests: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM diet_plan_requests WHERE status IN ('pending', 'in_progress')",
        )
        .fetch_one(&self.db)
        .await?;

        let (check_ins_today, members_in_building): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*) FILTER (WHERE (checked_in_at AT TIME ZONE 'UTC')::date
                                           = (NOW() AT TIME ZONE 'UTC')::date),
                    COUNT(*) FILTER (WHERE checked_out_at IS NULL)
             FROM check_ins",
        )
        .fetch_one(&self.db)
        .await?;

        let (orders_this_month, store_revenue_cents_this_month): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(total_cents), 0)::BIGINT
             FROM orders
             WHERE status IN ('pending', 'processing', 'completed')
               AND created_at >= date_trunc('month', NOW() AT TIME ZONE 'UTC') AT TIME ZONE 'UTC'",
        )
        .fetch_one(&self.db)
        .await?;

        Ok(AdminStats {
            members: MembershipCounts::from_rows(&membership_rows),
            active_subscriptions,
            pending_subscriptions,
            open_diet_requests,
            check_ins_today,
            members_in_building,
            orders_this_month,
            store_revenue_cents_this_month,
            generated_at: Utc::now(),
        })
    }
}

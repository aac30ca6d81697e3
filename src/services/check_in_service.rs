use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::PgPool;
use std::collections::{BTreeSet, HashMap};
use tracing::info;
use uuid::Uuid;

use crate::auth::{UserRole, UserSession};
use crate::config::LoyaltyConfig;
use crate::error::{is_unique_violation, AppError, AppResult};
use crate::models::{
    validate_range, ActiveCheckIn, CheckIn, CheckInResponse, ConsistencyReport, ConsistencyResult,
    HistoryQuery, LoyaltyTransactionType, Page, WeeklyConsistency,
};
use crate::services::loyalty_service::LoyaltyService;
use crate::services::member_service::MemberService;
use crate::services::slot_generation::week_start;

const CHECK_IN_COLUMNS: &str = "id, member_id, checked_in_at, checked_out_at, recorded_by";
pub const DEFAULT_REPORT_WEEKS: u32 = 8;
pub const MAX_REPORT_WEEKS: u32 = 52;

pub fn qualifies(days_checked_in: i64, required_days: u32) -> bool {
    days_checked_in >= i64::from(required_days)
}

/// Midnight UTC bounds of the ISO week starting on `monday`
fn week_bounds(monday: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = monday.and_time(chrono::NaiveTime::MIN).and_utc();
    (start, start + Duration::days(7))
}

/// Build the weekly report for the `weeks` weeks ending with the week of `today`,
/// oldest first.
pub fn summarize_weeks(
    today: NaiveDate,
    weeks: u32,
    required_days: u32,
    check_in_days: &[NaiveDate],
    awards: &HashMap<NaiveDate, i64>,
) -> Vec<WeeklyConsistency> {
    let current = week_start(today);
    let distinct: BTreeSet<NaiveDate> = check_in_days.iter().copied().collect();

    (0..i64::from(weeks))
        .rev()
        .map(|back| {
            let monday = current - Duration::weeks(back);
            let sunday = monday + Duration::days(6);
            let days_checked_in = distinct.range(monday..=sunday).count() as i64;

            WeeklyConsistency {
                week_start: monday,
                days_checked_in,
                qualified: qualifies(days_checked_in, required_days),
                points_awarded: awards.get(&monday).copied().unwrap_or(0),
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct CheckInService {
    db: PgPool,
    loyalty: LoyaltyConfig,
}

impl CheckInService {
    pub fn new(db: PgPool, loyalty: LoyaltyConfig) -> Self {
        Self { db, loyalty }
    }

    /// Record a desk check-in and settle the consistency award for its week
    pub async fn check_in(&self, desk: &UserSession, member_id: Uuid) -> AppResult<CheckInResponse> {
        let mut tx = self.db.begin().await?;

        let role: Option<UserRole> = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
            .bind(member_id)
            .fetch_optional(&mut *tx)
            .await?;
        if role != Some(UserRole::Member) {
            return Err(AppError::not_found(format!("Member {member_id} not found")));
        }

        MemberService::require_active_membership(&mut *tx, member_id).await?;

        let check_in = sqlx::query_as::<_, CheckIn>(&format!(
            "INSERT INTO check_ins (member_id, recorded_by)
             VALUES ($1, $2)
             RETURNING {CHECK_IN_COLUMNS}"
        ))
        .bind(member_id)
        .bind(desk.user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AppError::conflict("Member is already checked in")
            } else {
                err.into()
            }
        })?;

        let monday = week_start(check_in.checked_in_at.date_naive());
        let (from, to) = week_bounds(monday);

        let days_this_week: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT (checked_in_at AT TIME ZONE 'UTC')::date)
             FROM check_ins
             WHERE member_id = $1 AND checked_in_at >= $2 AND checked_in_at < $3",
        )
        .bind(member_id)
        .bind(from)
        .bind(to)
        .fetch_one(&mut *tx)
        .await?;

        let required_days = self.loyalty.consistency_required_days;
        let mut points_awarded = 0;

        if qualifies(days_this_week, required_days) {
            let award_id: Option<Uuid> = sqlx::query_scalar(
                "INSERT INTO consistency_awards (member_id, week_start, check_in_days, points_awarded)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (member_id, week_start) DO NOTHING
                 RETURNING id",
            )
            .bind(member_id)
            .bind(monday)
            .bind(days_this_week as i32)
            .bind(self.loyalty.consistency_points)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(award_id) = award_id {
                if self.loyalty.consistency_points > 0 {
                    LoyaltyService::record(
                        &mut *tx,
                        member_id,
                        self.loyalty.consistency_points,
                        LoyaltyTransactionType::Earned,
                        &format!("Consistency bonus for week of {monday}"),
                        Some(award_id),
                    )
                    .await?;
                }
                points_awarded = self.loyalty.consistency_points;
            }
        }

        tx.commit().await?;

        info!(
            check_in_id = %check_in.id,
            member_id = %member_id,
            days_this_week,
            points_awarded,
            "member checked in"
        );

        Ok(CheckInResponse {
            check_in,
            consistency: ConsistencyResult {
                week_start: monday,
                days_this_week,
                required_days,
                points_awarded,
            },
        })
    }

    pub async fn check_out(&self, check_in_id: Uuid) -> AppResult<CheckIn> {
        let closed = sqlx::query_as::<_, CheckIn>(&format!(
            "UPDATE check_ins SET checked_out_at = NOW()
             WHERE id = $1 AND checked_out_at IS NULL
             RETURNING {CHECK_IN_COLUMNS}"
        ))
        .bind(check_in_id)
        .fetch_optional(&self.db)
        .await?;

        if let Some(closed) = closed {
            info!(check_in_id = %check_in_id, member_id = %closed.member_id, "member checked out");
            return Ok(closed);
        }

        let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM check_ins WHERE id = $1")
            .bind(check_in_id)
            .fetch_optional(&self.db)
            .await?;
        match exists {
            Some(_) => Err(AppError::conflict("Check-in is already closed")),
            None => Err(AppError::not_found(format!("Check-in {check_in_id} not found"))),
        }
    }

    pub async fn active(&self) -> AppResult<Vec<ActiveCheckIn>> {
        let active = sqlx::query_as::<_, ActiveCheckIn>(
            "SELECT c.id, c.member_id, u.full_name, u.email, c.checked_in_at
             FROM check_ins c JOIN users u ON u.id = c.member_id
             WHERE c.checked_out_at IS NULL
             ORDER BY c.checked_in_at",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(active)
    }

    pub async fn history(&self, member_id: Uuid, query: &HistoryQuery) -> AppResult<Vec<CheckIn>> {
        let page = Page::from_params(query.limit, query.offset)?;

        let history = sqlx::query_as::<_, CheckIn>(&format!(
            "SELECT {CHECK_IN_COLUMNS} FROM check_ins
             WHERE member_id = $1
             ORDER BY checked_in_at DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(member_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;

        Ok(history)
    }

    pub async fn consistency_report(&self, member_id: Uuid, weeks: Option<u32>) -> AppResult<ConsistencyReport> {
        let weeks = weeks.unwrap_or(DEFAULT_REPORT_WEEKS);
        validate_range("weeks", weeks, 1, MAX_REPORT_WEEKS)?;

        let today = Utc::now().date_naive();
        let first_monday = week_start(today) - Duration::weeks(i64::from(weeks) - 1);
        let (from, _) = week_bounds(first_monday);

        let days: Vec<NaiveDate> = sqlx::query_scalar(
            "SELECT DISTINCT (checked_in_at AT TIME ZONE 'UTC')::date
             FROM check_ins
             WHERE member_id = $1 AND checked_in_at >= $2",
        )
        .bind(member_id)
        .bind(from)
        .fetch_all(&self.db)
        .await?;

        let awards: HashMap<NaiveDate, i64> = sqlx::query_as::<_, (NaiveDate, i64)>(
            "SELECT week_start, points_awarded FROM consistency_awards
             WHERE member_id = $1 AND week_start >= $2",
        )
        .bind(member_id)
        .bind(first_monday)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .collect();

        let required_days = self.loyalty.consistency_required_days;
        Ok(ConsistencyReport {
            member_id,
            required_days,
            weeks: summarize_weeks(today, weeks, required_days, &days, &awards),
        })
    }
}

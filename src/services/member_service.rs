use chrono::{NaiveDate, Utc};
use sqlx::{PgConnection, PgExecutor, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::auth::{hash_password, AuthError, UserRole};
use crate::error::{is_unique_violation, AppError, AppResult};
use crate::models::{
    normalize_email, CreateMemberRequest, MemberListQuery, MemberProfile, MemberSummary,
    MembershipAction, MembershipActionRequest, MembershipStatus, NewUser, Page,
    UpdateMemberProfileRequest,
};
use crate::services::membership_plan_service::MembershipPlanService;
use crate::services::slot_generation::add_months;
use crate::services::user_service::UserService;

const PROFILE_COLUMNS: &str = "user_id, membership_plan_id, membership_status, membership_start, \
     membership_end, date_of_birth, gender, emergency_contact, fitness_goals, loyalty_points, \
     created_at, updated_at";

const SUMMARY_SELECT: &str = "SELECT u.id AS user_id, u.email, u.full_name, u.phone, u.is_active, \
     p.membership_plan_id, mp.name AS plan_name, p.membership_status, p.membership_start, \
     p.membership_end, p.loyalty_points, u.created_at \
     FROM member_profiles p \
     JOIN users u ON u.id = p.user_id \
     LEFT JOIN membership_plans mp ON mp.id = p.membership_plan_id";

/// Membership state written together with a new profile
#[derive(Debug, Clone)]
pub struct InitialMembership {
    pub plan_id: Option<Uuid>,
    pub status: MembershipStatus,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl InitialMembership {
    pub fn none() -> Self {
        Self {
            plan_id: None,
            status: MembershipStatus::None,
            start: None,
            end: None,
        }
    }

    pub fn requested(plan_id: Uuid) -> Self {
        Self {
            plan_id: Some(plan_id),
            status: MembershipStatus::Pending,
            start: None,
            end: None,
        }
    }

    pub fn active(plan_id: Uuid, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            plan_id: Some(plan_id),
            status: MembershipStatus::Active,
            start: Some(start),
            end: Some(end),
        }
    }
}

/// Term dates for a renewal. An unexpired active term is extended from its
/// end date; anything else restarts today.
pub fn renewal_term(
    status: MembershipStatus,
    current_end: Option<NaiveDate>,
    today: NaiveDate,
    duration_months: u32,
) -> (NaiveDate, NaiveDate) {
    let start = match (status, current_end) {
        (MembershipStatus::Active, Some(end)) if end > today => end,
        _ => today,
    };
    (start, add_months(start, duration_months))
}

#[derive(Clone)]
pub struct MemberService {
    db: PgPool,
}

impl MemberService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn insert_profile(
        conn: &mut PgConnection,
        user_id: Uuid,
        membership: &InitialMembership,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO member_profiles
                (user_id, membership_plan_id, membership_status, membership_start, membership_end)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user_id)
        .bind(membership.plan_id)
        .bind(membership.status)
        .bind(membership.start)
        .bind(membership.end)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn ensure_profile(conn: &mut PgConnection, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO member_profiles (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// 404 when the user has no member profile, 403 unless the membership is current
    pub async fn require_active_membership<'e, E>(executor: E, member_id: Uuid) -> AppResult<()>
    where
        E: PgExecutor<'e>,
    {
        let row: Option<(MembershipStatus, Option<NaiveDate>)> = sqlx::query_as(
            "SELECT membership_status, membership_end FROM member_profiles WHERE user_id = $1",
        )
        .bind(member_id)
        .fetch_optional(executor)
        .await?;

        let today = Utc::now().date_naive();
        match row {
            None => Err(AppError::not_found(format!("Member {member_id} not found"))),
            Some((MembershipStatus::Active, end)) if end.map_or(true, |end| end >= today) => Ok(()),
            Some(_) => Err(AppError::forbidden("An active membership is required")),
        }
    }

    pub async fn list_members(&self, query: &MemberListQuery) -> AppResult<Vec<MemberSummary>> {
        let page = Page::from_params(query.limit, query.offset)?;

        let members = sqlx::query_as::<_, MemberSummary>(&format!(
            "{SUMMARY_SELECT}
             WHERE ($1::membership_status IS NULL OR p.membership_status = $1)
             ORDER BY u.created_at DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(query.status)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;

        Ok(members)
    }

    pub async fn list_pending(&self) -> AppResult<Vec<MemberSummary>> {
        let members = sqlx::query_as::<_, MemberSummary>(&format!(
            "{SUMMARY_SELECT}
             WHERE p.membership_status = 'pending'
             ORDER BY p.updated_at"
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(members)
    }

    pub async fn get_member(&self, member_id: Uuid) -> AppResult<MemberSummary> {
        sqlx::query_as::<_, MemberSummary>(&format!("{SUMMARY_SELECT} WHERE p.user_id = $1"))
            .bind(member_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Member {member_id} not found")))
    }

    pub async fn get_profile(&self, member_id: Uuid) -> AppResult<MemberProfile> {
        sqlx::query_as::<_, MemberProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM member_profiles WHERE user_id = $1"
        ))
        .bind(member_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Member profile not found"))
    }

    pub async fn update_profile(
        &self,
        member_id: Uuid,
        request: UpdateMemberProfileRequest,
    ) -> AppResult<MemberProfile> {
        request.validate(Utc::now().date_naive())?;

        sqlx::query_as::<_, MemberProfile>(&format!(
            "UPDATE member_profiles
             SET date_of_birth = COALESCE($2, date_of_birth),
                 gender = COALESCE($3, gender),
                 emergency_contact = COALESCE($4, emergency_contact),
                 fitness_goals = COALESCE($5, fitness_goals),
                 updated_at = NOW()
             WHERE user_id = $1
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(member_id)
        .bind(request.date_of_birth)
        .bind(&request.gender)
        .bind(&request.emergency_contact)
        .bind(&request.fitness_goals)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Member profile not found"))
    }

    /// Front-desk enrolment: the membership is active from today
    pub async fn create_member(&self, request: CreateMemberRequest) -> AppResult<MemberSummary> {
        request.validate()?;
        let password_hash = hash_password(&request.password).map_err(AuthError::from)?;

        let mut tx = self.db.begin().await?;

        let plan = MembershipPlanService::find_active_plan(&mut *tx, request.membership_plan_id).await?;

        let new_user = NewUser {
            email: normalize_email(&request.email),
            password_hash,
            full_name: request.full_name.trim().to_string(),
            phone: request.phone.clone(),
            role: UserRole::Member,
        };
        let user = UserService::insert_user(&mut *tx, &new_user)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    AppError::conflict("Email already exists")
                } else {
                    AppError::from(err)
                }
            })?;

        let start = Utc::now().date_naive();
        let end = add_months(start, plan.duration_months as u32);
        Self::insert_profile(&mut *tx, user.id, &InitialMembership::active(plan.id, start, end)).await?;

        tx.commit().await?;

        info!(member_id = %user.id, plan_id = %plan.id, "enrolled member");
        self.get_member(user.id).await
    }

    /// Approve, renew or cancel a membership
    pub async fn apply_action(
        &self,
        member_id: Uuid,
        request: MembershipActionRequest,
    ) -> AppResult<MemberProfile> {
        let mut tx = self.db.begin().await?;
        let profile = Self::lock_profile(&mut *tx, member_id).await?;
        let today = Utc::now().date_naive();

        let updated = match request.action {
            MembershipAction::Approve => {
                if profile.membership_status != MembershipStatus::Pending {
                    return Err(AppError::conflict(format!(
                        "Only pending memberships can be approved (current: {:?})",
                        profile.membership_status
                    )));
                }
                let plan_id = profile
                    .membership_plan_id
                    .ok_or_else(|| AppError::validation("Pending membership has no plan"))?;
                let plan = MembershipPlanService::find_active_plan(&mut *tx, plan_id).await?;
                let end = add_months(today, plan.duration_months as u32);

                Self::write_membership(&mut *tx, member_id, &InitialMembership::active(plan.id, today, end))
                    .await?
            }
            MembershipAction::Renew => {
                let plan_id = request
                    .membership_plan_id
                    .or(profile.membership_plan_id)
                    .ok_or_else(|| AppError::validation("No membership plan to renew"))?;
                let plan = MembershipPlanService::find_active_plan(&mut *tx, plan_id).await?;
                let (start, end) = renewal_term(
                    profile.membership_status,
                    profile.membership_end,
                    today,
                    plan.duration_months as u32,
                );

                Self::write_membership(&mut *tx, member_id, &InitialMembership::active(plan.id, start, end))
                    .await?
            }
            MembershipAction::Cancel => {
                if !matches!(
                    profile.membership_status,
                    MembershipStatus::Pending | MembershipStatus::Active
                ) {
                    return Err(AppError::conflict(format!(
                        "Cannot cancel a membership in status {:?}",
                        profile.membership_status
                    )));
                }

                let membership = InitialMembership {
                    status: MembershipStatus::Cancelled,
                    plan_id: profile.membership_plan_id,
                    start: profile.membership_start,
                    end: profile.membership_end,
                };
                Self::write_membership(&mut *tx, member_id, &membership).await?
            }
        };

        tx.commit().await?;

        info!(member_id = %member_id, action = ?request.action, "membership updated");
        Ok(updated)
    }

    /// Member asks for a plan; staff approve it later
    pub async fn request_plan(&self, member_id: Uuid, plan_id: Uuid) -> AppResult<MemberProfile> {
        let mut tx = self.db.begin().await?;
        let profile = Self::lock_profile(&mut *tx, member_id).await?;

        if profile.membership_status == MembershipStatus::Active {
            return Err(AppError::conflict("Membership is already active"));
        }

        let plan = MembershipPlanService::find_active_plan(&mut *tx, plan_id).await?;
        let updated = Self::write_membership(&mut *tx, member_id, &InitialMembership::requested(plan.id)).await?;

        tx.commit().await?;

        info!(member_id = %member_id, plan_id = %plan.id, "membership requested");
        Ok(updated)
    }

    /// Flip active memberships whose end date has passed
    pub async fn expire_memberships(&self) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE member_profiles
             SET membership_status = 'expired', updated_at = NOW()
             WHERE membership_status = 'active' AND membership_end < CURRENT_DATE",
        )
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    async fn lock_profile(conn: &mut PgConnection, member_id: Uuid) -> AppResult<MemberProfile> {
        sqlx::query_as::<_, MemberProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM member_profiles WHERE user_id = $1 FOR UPDATE"
        ))
        .bind(member_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Member {member_id} not found")))
    }

    async fn write_membership(
        conn: &mut PgConnection,
        member_id: Uuid,
        membership: &InitialMembership,
    ) -> AppResult<MemberProfile> {
        let profile = sqlx::query_as::<_, MemberProfile>(&format!(
            "UPDATE member_profiles
             SET membership_plan_id = $2,
                 membership_status = $3,
                 membership_start = $4,
                 membership_end = $5,
                 updated_at = NOW()
             WHERE user_id = $1
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(member_id)
        .bind(membership.plan_id)
        .bind(membership.status)
        .bind(membership.start)
        .bind(membership.end)
        .fetch_one(conn)
        .await?;

        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_renewal_extends_unexpired_term() {
        let today = d(2024, 3, 10);
        let (start, end) = renewal_term(MembershipStatus::Active, Some(d(2024, 3, 31)), today, 1);
        assert_eq!(start, d(2024, 3, 31));
        assert_eq!(end, d(2024, 4, 30));
    }

    #[test]
    fn test_renewal_restarts_lapsed_term() {
        let today = d(2024, 3, 10);

        let (start, end) = renewal_term(MembershipStatus::Expired, Some(d(2024, 2, 1)), today, 3);
        assert_eq!((start, end), (today, d(2024, 6, 10)));

        let (start, _) = renewal_term(MembershipStatus::Active, Some(today), today, 1);
        assert_eq!(start, today);

        let (start, _) = renewal_term(MembershipStatus::Cancelled, Some(d(2024, 12, 1)), today, 1);
        assert_eq!(start, today);
    }
}

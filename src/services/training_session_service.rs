use chrono::Utc;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::auth::{UserRole, UserSession};
use crate::error::{AppError, AppResult};
use crate::models::{
    BookSessionRequest, SessionListQuery, SessionStatus, TimeRange, TrainingSession,
};
use crate::services::member_service::MemberService;
use crate::services::slot_generation::fits_within;
use crate::services::trainer_service::TrainerService;

const SESSION_COLUMNS: &str = "id, trainer_id, member_id, session_date, start_time, end_time, \
     status, notes, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTransition {
    Complete,
    Cancel,
    NoShow,
}

impl SessionTransition {
    fn target(self) -> SessionStatus {
        match self {
            SessionTransition::Complete => SessionStatus::Completed,
            SessionTransition::Cancel => SessionStatus::Cancelled,
            SessionTransition::NoShow => SessionStatus::NoShow,
        }
    }

    /// Trainers close out their own sessions; either party (or an admin) may cancel
    fn permitted(self, actor: &UserSession, session: &TrainingSession) -> bool {
        let is_trainer = actor.user_id == session.trainer_id;
        match self {
            SessionTransition::Complete | SessionTransition::NoShow => is_trainer,
            SessionTransition::Cancel => {
                is_trainer || actor.user_id == session.member_id || actor.is_admin()
            }
        }
    }
}

#[derive(Clone)]
pub struct TrainingSessionService {
    db: PgPool,
}

impl TrainingSessionService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Book a one-off session inside the trainer's availability
    pub async fn book(&self, member_id: Uuid, request: BookSessionRequest) -> AppResult<TrainingSession> {
        request.validate(Utc::now().date_naive())?;
        let wanted = TimeRange::new(request.start_time, request.end_time);

        let mut tx = self.db.begin().await?;

        MemberService::require_active_membership(&mut *tx, member_id).await?;

        // Serialises concurrent bookings against the same trainer
        let available: Option<bool> =
            sqlx::query_scalar("SELECT is_available FROM trainers WHERE user_id = $1 FOR UPDATE")
                .bind(request.trainer_id)
                .fetch_optional(&mut *tx)
                .await?;
        match available {
            None => {
                return Err(AppError::not_found(format!(
                    "Trainer {} not found",
                    request.trainer_id
                )))
            }
            Some(false) => return Err(AppError::validation("Trainer is not taking bookings")),
            Some(true) => {}
        }

        let windows = TrainerService::windows_on(&mut *tx, request.trainer_id, request.session_date).await?;
        if !fits_within(&windows, &wanted) {
            return Err(AppError::validation(
                "Requested time is outside the trainer's availability",
            ));
        }

        let busy = TrainerService::busy_on(&mut *tx, request.trainer_id, request.session_date).await?;
        if busy.iter().any(|range| range.overlaps(&wanted)) {
            return Err(AppError::conflict("Trainer is already booked at that time"));
        }

        let member_clash: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM training_sessions
             WHERE member_id = $1 AND session_date = $2 AND status = 'scheduled'
               AND start_time < $4 AND $3 < end_time
             LIMIT 1",
        )
        .bind(member_id)
        .bind(request.session_date)
        .bind(request.start_time)
        .bind(request.end_time)
        .fetch_optional(&mut *tx)
        .await?;
        if member_clash.is_some() {
            return Err(AppError::conflict("You already have a session at that time"));
        }

        let session = sqlx::query_as::<_, TrainingSession>(&format!(
            "INSERT INTO training_sessions (trainer_id, member_id, session_date, start_time, end_time, notes)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(request.trainer_id)
        .bind(member_id)
        .bind(request.session_date)
        .bind(request.start_time)
        .bind(request.end_time)
        .bind(&request.notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(session_id = %session.id, trainer_id = %session.trainer_id, "booked training session");
        Ok(session)
    }

    /// Sessions where the caller is the trainer (for trainers) or the member
    pub async fn list_for(&self, actor: &UserSession, query: &SessionListQuery) -> AppResult<Vec<TrainingSession>> {
        let owner_column = if actor.role == UserRole::Trainer {
            "trainer_id"
        } else {
            "member_id"
        };

        let sessions = sqlx::query_as::<_, TrainingSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM training_sessions
             WHERE {owner_column} = $1
               AND ($2::session_status IS NULL OR status = $2)
               AND ($3::date IS NULL OR session_date >= $3)
               AND ($4::date IS NULL OR session_date <= $4)
             ORDER BY session_date, start_time"
        ))
        .bind(actor.user_id)
        .bind(query.status)
        .bind(query.from)
        .bind(query.to)
        .fetch_all(&self.db)
        .await?;

        Ok(sessions)
    }

    pub async fn transition(
        &self,
        actor: &UserSession,
        session_id: Uuid,
        transition: SessionTransition,
    ) -> AppResult<TrainingSession> {
        let mut tx = self.db.begin().await?;

        let session = sqlx::query_as::<_, TrainingSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM training_sessions WHERE id = $1 FOR UPDATE"
        ))
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Session {session_id} not found")))?;

        if !transition.permitted(actor, &session) {
            return Err(AppError::forbidden("You cannot change this session"));
        }

        if session.status != SessionStatus::Scheduled {
            return Err(AppError::conflict(format!(
                "Session is {:?}; only scheduled sessions can change",
                session.status
            )));
        }

        let updated = sqlx::query_as::<_, TrainingSession>(&format!(
            "UPDATE training_sessions SET status = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(session_id)
        .bind(transition.target())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(session_id = %session_id, status = ?updated.status, "session status changed");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn session(trainer_id: Uuid, member_id: Uuid) -> TrainingSession {
        TrainingSession {
            id: Uuid::new_v4(),
            trainer_id,
            member_id,
            session_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            status: SessionStatus::Scheduled,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn actor(user_id: Uuid, role: UserRole) -> UserSession {
        UserSession {
            user_id,
            email: "someone@finova.test".to_string(),
            role,
            jti: Uuid::new_v4().to_string(),
            exp: 0,
        }
    }

    #[test]
    fn test_transition_permissions() {
        let trainer = Uuid::new_v4();
        let member = Uuid::new_v4();
        let booked = session(trainer, member);

        let as_trainer = actor(trainer, UserRole::Trainer);
        let as_member = actor(member, UserRole::Member);
        let as_admin = actor(Uuid::new_v4(), UserRole::Admin);
        let stranger = actor(Uuid::new_v4(), UserRole::Trainer);

        assert!(SessionTransition::Complete.permitted(&as_trainer, &booked));
        assert!(!SessionTransition::Complete.permitted(&as_member, &booked));
        assert!(!SessionTransition::NoShow.permitted(&stranger, &booked));

        assert!(SessionTransition::Cancel.permitted(&as_member, &booked));
        assert!(SessionTransition::Cancel.permitted(&as_trainer, &booked));
        assert!(SessionTransition::Cancel.permitted(&as_admin, &booked));
        assert!(!SessionTransition::Cancel.permitted(&stranger, &booked));
    }

    #[test]
    fn test_transition_targets() {
        assert_eq!(SessionTransition::Complete.target(), SessionStatus::Completed);
        assert_eq!(SessionTransition::NoShow.target(), SessionStatus::NoShow);
        assert_eq!(SessionTransition::Cancel.target(), SessionStatus::Cancelled);
    }
}

use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::auth::{hash_password, AuthError, UserRole, UserSession};
use crate::error::{is_unique_violation, AppError, AppResult};
use crate::models::{
    normalize_email, CreateUserRequest, NewUser, Page, UpdateUserRequest, User, UserListQuery,
    UserResponse,
};
use crate::services::member_service::{InitialMembership, MemberService};
use crate::services::trainer_service::TrainerService;

const USER_COLUMNS: &str =
    "id, email, password_hash, full_name, phone, role, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Insert a user row on an existing connection or transaction
    pub async fn insert_user(conn: &mut PgConnection, new_user: &NewUser) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash, full_name, phone, role)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.full_name)
        .bind(&new_user.phone)
        .bind(new_user.role)
        .fetch_one(conn)
        .await
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(normalize_email(email))
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    pub async fn get_user(&self, user_id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {user_id} not found")))
    }

    pub async fn list_users(&self, query: &UserListQuery) -> AppResult<Vec<UserResponse>> {
        let page = Page::from_params(query.limit, query.offset)?;

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE ($1::user_role IS NULL OR role = $1)
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(query.role)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;

        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    /// Admin-created account with an explicit role and its role profile
    pub async fn create_user(&self, request: CreateUserRequest) -> AppResult<UserResponse> {
        request.validate()?;
        let password_hash = hash_password(&request.password).map_err(AuthError::from)?;

        let new_user = NewUser {
            email: normalize_email(&request.email),
            password_hash,
            full_name: request.full_name.trim().to_string(),
            phone: request.phone.clone(),
            role: request.role,
        };

        let mut tx = self.db.begin().await?;

        let user = Self::insert_user(&mut *tx, &new_user)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    AppError::conflict("Email already exists")
                } else {
                    AppError::from(err)
                }
            })?;

        match user.role {
            UserRole::Member => {
                MemberService::insert_profile(&mut *tx, user.id, &InitialMembership::none()).await?;
            }
            UserRole::Trainer => {
                TrainerService::insert_profile(
                    &mut *tx,
                    user.id,
                    request.specialization.as_deref(),
                    request.hourly_rate_cents,
                )
                .await?;
            }
            _ => {}
        }

        tx.commit().await?;

        info!(user_id = %user.id, role = %user.role, "created user");
        Ok(user.into())
    }

    pub async fn update_user(
        &self,
        actor: &UserSession,
        user_id: Uuid,
        request: UpdateUserRequest,
    ) -> AppResult<UserResponse> {
        request.validate()?;

        if actor.user_id == user_id {
            if request.is_active == Some(false) {
                return Err(AppError::validation("You cannot deactivate your own account"));
            }
            if matches!(request.role, Some(role) if role != actor.role) {
                return Err(AppError::validation("You cannot change your own role"));
            }
        }

        let mut tx = self.db.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET full_name = COALESCE($2, full_name),
                 phone = COALESCE($3, phone),
                 role = COALESCE($4, role),
                 is_active = COALESCE($5, is_active),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(request.full_name.as_deref().map(str::trim))
        .bind(&request.phone)
        .bind(request.role)
        .bind(request.is_active)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {user_id} not found")))?;

        // A role change brings the matching profile into existence
        match request.role {
            Some(UserRole::Member) => {
                MemberService::ensure_profile(&mut *tx, user.id).await?;
            }
            Some(UserRole::Trainer) => {
                TrainerService::ensure_profile(&mut *tx, user.id).await?;
            }
            _ => {}
        }

        tx.commit().await?;

        info!(user_id = %user.id, "updated user");
        Ok(user.into())
    }

    pub async fn delete_user(&self, actor: &UserSession, user_id: Uuid) -> AppResult<()> {
        if actor.user_id == user_id {
            return Err(AppError::validation("You cannot delete your own account"));
        }

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("User {user_id} not found")));
        }

        info!(user_id = %user_id, "deleted user");
        Ok(())
    }
}

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::{
    AuthError, AuthResponse, ChangePasswordRequest, JwtService, LoginRequest, MessageResponse,
    RefreshTokenRequest, RegisterRequest, TokenKind, TokenResponse, UserRole, UserSession,
};
use crate::config::AppConfig;
use crate::error::is_unique_violation;
use crate::models::{
    normalize_email, validate_email, validate_phone, validate_text, NewUser, User, UserResponse,
};
use crate::services::member_service::{InitialMembership, MemberService};
use crate::services::user_service::UserService;

const USER_COLUMNS: &str =
    "id, email, password_hash, full_name, phone, role, is_active, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct AuthService {
    jwt_service: JwtService,
    db: PgPool,
}

impl AuthService {
    pub fn new(db: PgPool, config: &AppConfig) -> Self {
        Self {
            jwt_service: JwtService::new(
                &config.jwt_secret,
                Duration::minutes(config.access_token_ttl_minutes),
                Duration::days(config.refresh_token_ttl_days),
            ),
            db,
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt_service
    }

    /// Self-service member registration, optionally requesting a plan
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AuthError> {
        let email = normalize_email(&request.email);
        validate_email(&email).map_err(|e| AuthError::Validation(e.to_string()))?;
        validate_text("full_name", &request.full_name, 120)
            .map_err(|e| AuthError::Validation(e.to_string()))?;
        if let Some(phone) = &request.phone {
            validate_phone(phone).map_err(|e| AuthError::Validation(e.to_string()))?;
        }

        let password_hash = hash_password(&request.password)?;

        let mut tx = self.db.begin().await?;

        let membership = match request.membership_plan_id {
            Some(plan_id) => {
                let active: Option<bool> =
                    sqlx::query_scalar("SELECT is_active FROM membership_plans WHERE id = $1")
                        .bind(plan_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                if active != Some(true) {
                    return Err(AuthError::InvalidMembershipPlan);
                }
                InitialMembership::requested(plan_id)
            }
            None => InitialMembership::none(),
        };

        let new_user = NewUser {
            email,
            password_hash,
            full_name: request.full_name.trim().to_string(),
            phone: request.phone,
            role: UserRole::Member,
        };

        let user = UserService::insert_user(&mut *tx, &new_user)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    AuthError::EmailAlreadyExists
                } else {
                    AuthError::Database(err)
                }
            })?;

        MemberService::insert_profile(&mut *tx, user.id, &membership).await?;

        tx.commit().await?;

        info!(user_id = %user.id, "registered member");
        self.issue_tokens(user).await
    }

    /// Login user
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        let user = self
            .find_user_by_email(&normalize_email(&request.email))
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&request.password, &user.password_hash)? {
            warn!(user_id = %user.id, "failed login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        // Same answer as a bad password so account state is not disclosed
        if !user.is_active {
            warn!(user_id = %user.id, "login attempt on deactivated account");
            return Err(AuthError::InvalidCredentials);
        }

        self.issue_tokens(user).await
    }

    /// Exchange a stored refresh token for a new access token
    pub async fn refresh_token(&self, request: RefreshTokenRequest) -> Result<TokenResponse, AuthError> {
        let claims = self
            .jwt_service
            .validate_token_kind(&request.refresh_token, TokenKind::Refresh)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        if !self.is_refresh_token_valid(user_id, &request.refresh_token).await? {
            return Err(AuthError::InvalidToken);
        }

        // Role may have changed since the refresh token was issued
        let user = self.load_user(user_id).await?;
        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        let access_token = self
            .jwt_service
            .create_access_token(user.id, &user.email, user.role)?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_expires_in_seconds(),
        })
    }

    /// Blacklist the access token and revoke every refresh token of its owner
    pub async fn logout(&self, token: &str) -> Result<MessageResponse, AuthError> {
        let claims = self.jwt_service.validate_token_kind(token, TokenKind::Access)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        self.blacklist_token(&claims.jti, claims.exp as i64).await?;
        self.revoke_user_refresh_tokens(user_id).await?;

        info!(user_id = %user_id, "logged out");
        Ok(MessageResponse::new("Successfully logged out"))
    }

    /// Check if token is blacklisted
    pub async fn is_token_blacklisted(&self, jti: &str) -> Result<bool, AuthError> {
        let result = sqlx::query("SELECT 1 FROM token_blacklist WHERE jti = $1 AND expires_at > NOW()")
            .bind(jti)
            .fetch_optional(&self.db)
            .await?;

        Ok(result.is_some())
    }

    /// Validate user session from token. Role and account status come from
    /// the database so deactivation and role changes apply immediately.
    pub async fn validate_session(&self, token: &str) -> Result<UserSession, AuthError> {
        let mut session = self.jwt_service.extract_user_session(token)?;

        if self.is_token_blacklisted(&session.jti).await? {
            return Err(AuthError::InvalidToken);
        }

        let (role, is_active): (UserRole, bool) =
            sqlx::query_as("SELECT role, is_active FROM users WHERE id = $1")
                .bind(session.user_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or(AuthError::InvalidToken)?;

        if !is_active {
            return Err(AuthError::AccountDisabled);
        }
        session.role = role;

        Ok(session)
    }

    pub async fn current_user(&self, session: &UserSession) -> Result<UserResponse, AuthError> {
        let user = self.load_user(session.user_id).await?;
        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }
        Ok(user.into())
    }

    pub async fn change_password(
        &self,
        session: &UserSession,
        request: ChangePasswordRequest,
    ) -> Result<MessageResponse, AuthError> {
        let user = self.load_user(session.user_id).await?;

        if !verify_password(&request.current_password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let password_hash = hash_password(&request.new_password)?;

        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(user.id)
            .bind(password_hash)
            .execute(&self.db)
            .await?;

        // Existing refresh tokens were issued under the old password
        self.revoke_user_refresh_tokens(user.id).await?;

        info!(user_id = %user.id, "password changed");
        Ok(MessageResponse::new("Password changed successfully"))
    }

    /// Remove blacklist rows for tokens that have expired anyway
    pub async fn prune_blacklist(&self) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM token_blacklist WHERE expires_at <= NOW()")
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }

    // Private helper methods

    async fn issue_tokens(&self, user: User) -> Result<AuthResponse, AuthError> {
        let (access_token, refresh_token) =
            self.jwt_service
                .create_token_pair(user.id, &user.email, user.role)?;

        self.store_refresh_token(user.id, &refresh_token).await?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_expires_in_seconds(),
            user: user.into(),
        })
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    async fn load_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AuthError::InvalidToken)
    }

    async fn store_refresh_token(&self, user_id: Uuid, refresh_token: &str) -> Result<(), AuthError> {
        let expires_at = Utc::now()
            + Duration::seconds(self.jwt_service.refresh_token_expires_in_seconds() as i64);

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(hash_token(refresh_token))
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn is_refresh_token_valid(&self, user_id: Uuid, refresh_token: &str) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "SELECT 1 FROM refresh_tokens
             WHERE user_id = $1 AND token_hash = $2 AND expires_at > NOW() AND NOT revoked",
        )
        .bind(user_id)
        .bind(hash_token(refresh_token))
        .fetch_optional(&self.db)
        .await?;

        Ok(result.is_some())
    }

    async fn revoke_user_refresh_tokens(&self, user_id: Uuid) -> Result<(), AuthError> {
        sqlx::query("UPDATE refresh_tokens SET revoked = true WHERE user_id = $1 AND NOT revoked")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn blacklist_token(&self, jti: &str, exp: i64) -> Result<(), AuthError> {
        let expires_at = DateTime::<Utc>::from_timestamp(exp, 0).ok_or(AuthError::InvalidToken)?;

        sqlx::query(
            "INSERT INTO token_blacklist (jti, expires_at) VALUES ($1, $2)
             ON CONFLICT (jti) DO NOTHING",
        )
        .bind(jti)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

fn hash_token(token: &str) -> String {
    format!("{:x}", md5::compute(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_hash_is_stable_hex() {
        let hash = hash_token("refresh-token");
        assert_eq!(hash.len(), 32);
        assert_eq!(hash, hash_token("refresh-token"));
        assert_ne!(hash, hash_token("refresh-token-2"));
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::AuthError;
use crate::error::AppError;
use crate::models::UserResponse;

/// Portal roles. Each role unlocks one portal of the front end.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
pub enum UserRole {
    Member,
    Trainer,
    Nutritionist,
    Admin,
    FrontDesk,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Member => "member",
            UserRole::Trainer => "trainer",
            UserRole::Nutritionist => "nutritionist",
            UserRole::Admin => "admin",
            UserRole::FrontDesk => "front_desk",
        }
    }

    /// Admin passes every role check; everyone else must be listed.
    pub fn is_permitted(&self, allowed: &[UserRole]) -> bool {
        *self == UserRole::Admin || allowed.contains(self)
    }

    pub fn is_staff(&self) -> bool {
        !matches!(self, UserRole::Member)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "member" => Ok(UserRole::Member),
            "trainer" => Ok(UserRole::Trainer),
            "nutritionist" => Ok(UserRole::Nutritionist),
            "admin" => Ok(UserRole::Admin),
            "front_desk" | "frontdesk" => Ok(UserRole::FrontDesk),
            other => Err(AppError::validation(format!("Unknown role: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT token claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,      // Subject (user ID)
    pub email: String,
    pub role: UserRole,
    pub typ: TokenKind,
    pub exp: usize,
    pub iat: usize,
    pub jti: String,      // JWT ID (for revocation)
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub membership_plan_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: usize,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: usize,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Authenticated caller, inserted into request extensions by the auth layer
#[derive(Debug, Clone)]
pub struct UserSession {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub jti: String,
    pub exp: usize,
}

impl UserSession {
    pub fn from_claims(claims: &Claims) -> Result<Self, uuid::Error> {
        Ok(Self {
            user_id: Uuid::parse_str(&claims.sub)?,
            email: claims.email.clone(),
            role: claims.role,
            jti: claims.jti.clone(),
            exp: claims.exp,
        })
    }

    pub fn require(&self, allowed: &[UserRole]) -> Result<(), AuthError> {
        if self.role.is_permitted(allowed) {
            Ok(())
        } else {
            Err(AuthError::InsufficientPermissions)
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("member".parse::<UserRole>().unwrap(), UserRole::Member);
        assert_eq!("Front_Desk".parse::<UserRole>().unwrap(), UserRole::FrontDesk);
        assert!("coach".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&UserRole::FrontDesk).unwrap();
        assert_eq!(json, "\"front_desk\"");
        let role: UserRole = serde_json::from_str("\"nutritionist\"").unwrap();
        assert_eq!(role, UserRole::Nutritionist);
    }

    #[test]
    fn test_role_permissions() {
        let desk_only = [UserRole::FrontDesk];

        assert!(UserRole::Admin.is_permitted(&desk_only));
        assert!(UserRole::FrontDesk.is_permitted(&desk_only));
        assert!(!UserRole::Member.is_permitted(&desk_only));
        assert!(!UserRole::Trainer.is_permitted(&[]));
        assert!(UserRole::Admin.is_permitted(&[]));
    }

    #[test]
    fn test_staff_roles() {
        assert!(!UserRole::Member.is_staff());
        assert!(UserRole::Trainer.is_staff());
        assert!(UserRole::FrontDesk.is_staff());
    }
}

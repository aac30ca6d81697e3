use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::UserRole;
use crate::error::AppResult;
use crate::models::validation::{
    validate_email, validate_non_negative, validate_optional_text, validate_phone, validate_text,
};

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public view of a user; never carries the password hash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            phone: user.phone,
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Row values for a user insert; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub specialization: Option<String>,
    pub hourly_rate_cents: Option<i64>,
}

impl CreateUserRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_email(&self.email)?;
        validate_text("full_name", &self.full_name, 120)?;
        if let Some(phone) = &self.phone {
            validate_phone(phone)?;
        }
        validate_optional_text("specialization", self.specialization.as_deref(), 120)?;
        if let Some(rate) = self.hourly_rate_cents {
            validate_non_negative("hourly_rate_cents", rate)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_optional_text("full_name", self.full_name.as_deref(), 120)?;
        if let Some(phone) = &self.phone {
            validate_phone(phone)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request() -> CreateUserRequest {
        CreateUserRequest {
            email: "coach@finova.fit".to_string(),
            password: "Finova#2024".to_string(),
            full_name: "Sam Coach".to_string(),
            phone: None,
            role: UserRole::Trainer,
            specialization: Some("Strength".to_string()),
            hourly_rate_cents: Some(4500),
        }
    }

    #[test]
    fn test_create_user_validation() {
        assert!(create_request().validate().is_ok());

        let mut request = create_request();
        request.email = "not-an-email".to_string();
        assert!(request.validate().is_err());

        let mut request = create_request();
        request.hourly_rate_cents = Some(-1);
        assert!(request.validate().is_err());

        let mut request = create_request();
        request.full_name = " ".to_string();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_update_user_validation() {
        assert!(UpdateUserRequest::default().validate().is_ok());

        let request = UpdateUserRequest {
            phone: Some("abc".to_string()),
            ..Default::default()
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_user_response_hides_password() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: "member@finova.fit".to_string(),
            password_hash: "$2b$12$hash".to_string(),
            full_name: "Member".to_string(),
            phone: None,
            role: UserRole::Member,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "member");
    }
}

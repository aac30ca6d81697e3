use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::auth::password::PasswordError;
use crate::error::AppError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Email already exists")]
    EmailAlreadyExists,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Missing authorization header")]
    MissingAuthHeader,
    #[error("Invalid authorization header format")]
    InvalidAuthHeaderFormat,
    #[error("Insufficient permissions")]
    InsufficientPermissions,
    #[error("Account disabled")]
    AccountDisabled,
    #[error("Membership plan does not exist or is not active")]
    InvalidMembershipPlan,
    #[error("{0}")]
    Validation(String),
    #[error("Password rejected: {0}")]
    Password(#[from] PasswordError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeaderFormat
            | AuthError::AccountDisabled
            | AuthError::Jwt(_) => AppError::Authentication(err.to_string()),
            AuthError::InsufficientPermissions => AppError::Authorization(err.to_string()),
            AuthError::EmailAlreadyExists => AppError::Conflict(err.to_string()),
            AuthError::InvalidMembershipPlan | AuthError::Validation(_) => {
                AppError::Validation(err.to_string())
            }
            AuthError::Password(password_err) if password_err.is_policy_violation() => {
                AppError::Validation(password_err.to_string())
            }
            AuthError::Password(password_err) => AppError::Internal(password_err.into()),
            AuthError::Database(db_err) => AppError::from(db_err),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_auth_error_status_mapping() {
        let cases = [
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::TokenExpired, StatusCode::UNAUTHORIZED),
            (AuthError::MissingAuthHeader, StatusCode::UNAUTHORIZED),
            (AuthError::AccountDisabled, StatusCode::UNAUTHORIZED),
            (AuthError::InsufficientPermissions, StatusCode::FORBIDDEN),
            (AuthError::EmailAlreadyExists, StatusCode::CONFLICT),
            (AuthError::InvalidMembershipPlan, StatusCode::BAD_REQUEST),
            (AuthError::Password(PasswordError::TooShort), StatusCode::BAD_REQUEST),
            (
                AuthError::Password(PasswordError::HashingFailed),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status_code(), expected);
        }
    }
}

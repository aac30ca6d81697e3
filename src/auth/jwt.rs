use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::{AuthError, Claims, TokenKind, UserRole, UserSession};

/// JWT token service for creating and validating tokens
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expires_in: Duration,
    refresh_token_expires_in: Duration,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("encoding_key", &"[REDACTED]")
            .field("decoding_key", &"[REDACTED]")
            .field("access_token_expires_in", &self.access_token_expires_in)
            .field("refresh_token_expires_in", &self.refresh_token_expires_in)
            .finish()
    }
}

impl JwtService {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_expires_in: access_ttl,
            refresh_token_expires_in: refresh_ttl,
        }
    }

    /// One-hour access tokens, thirty-day refresh tokens
    pub fn with_default_lifetimes(secret: &str) -> Self {
        Self::new(secret, Duration::minutes(60), Duration::days(30))
    }

    fn create_token(
        &self,
        user_id: Uuid,
        email: &str,
        role: UserRole,
        kind: TokenKind,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let lifetime = match kind {
            TokenKind::Access => self.access_token_expires_in,
            TokenKind::Refresh => self.refresh_token_expires_in,
        };

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role,
            typ: kind,
            exp: (now + lifetime).timestamp() as usize,
            iat: now.timestamp() as usize,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(AuthError::Jwt)
    }

    pub fn create_access_token(
        &self,
        user_id: Uuid,
        email: &str,
        role: UserRole,
    ) -> Result<String, AuthError> {
        self.create_token(user_id, email, role, TokenKind::Access)
    }

    pub fn create_refresh_token(
        &self,
        user_id: Uuid,
        email: &str,
        role: UserRole,
    ) -> Result<String, AuthError> {
        self.create_token(user_id, email, role, TokenKind::Refresh)
    }

    /// Validate and decode a token
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|token_data| token_data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })
    }

    /// Validate a token and require it to be of the given kind
    pub fn validate_token_kind(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        let claims = self.validate_token(token)?;
        if claims.typ != kind {
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }

    /// Extract user session from an access token
    pub fn extract_user_session(&self, token: &str) -> Result<UserSession, AuthError> {
        let claims = self.validate_token_kind(token, TokenKind::Access)?;
        UserSession::from_claims(&claims).map_err(|_| AuthError::InvalidToken)
    }

    pub fn access_token_expires_in_seconds(&self) -> usize {
        self.access_token_expires_in.num_seconds() as usize
    }

    pub fn refresh_token_expires_in_seconds(&self) -> usize {
        self.refresh_token_expires_in.num_seconds() as usize
    }

    /// Create token pair (access + refresh)
    pub fn create_token_pair(
        &self,
        user_id: Uuid,
        email: &str,
        role: UserRole,
    ) -> Result<(String, String), AuthError> {
        let access_token = self.create_access_token(user_id, email, role)?;
        let refresh_token = self.create_refresh_token(user_id, email, role)?;
        Ok((access_token, refresh_token))
    }
}

/// Extract bearer token from authorization header
pub fn extract_bearer_token(auth_header: &str) -> Result<&str, AuthError> {
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthHeaderFormat)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeaderFormat);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_jwt_creation_and_validation() {
        let jwt_service = JwtService::with_default_lifetimes("test_secret");
        let user_id = Uuid::new_v4();
        let email = "member@finova.test";

        let token = jwt_service
            .create_access_token(user_id, email, UserRole::Member)
            .unwrap();
        let claims = jwt_service.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, email);
        assert_eq!(claims.role, UserRole::Member);
        assert_eq!(claims.typ, TokenKind::Access);
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(extract_bearer_token("Bearer test_token").unwrap(), "test_token");

        assert!(extract_bearer_token("Invalid header").is_err());
        assert!(extract_bearer_token("Bearer ").is_err());
        assert!(extract_bearer_token("bearer abc").is_err());
    }

    #[test]
    fn test_user_session_extraction() {
        let jwt_service = JwtService::with_default_lifetimes("test_secret");
        let user_id = Uuid::new_v4();

        let token = jwt_service
            .create_access_token(user_id, "desk@finova.test", UserRole::FrontDesk)
            .unwrap();
        let session = jwt_service.extract_user_session(&token).unwrap();

        assert_eq!(session.user_id, user_id);
        assert_eq!(session.email, "desk@finova.test");
        assert_eq!(session.role, UserRole::FrontDesk);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let jwt_service = JwtService::with_default_lifetimes("test_secret");
        let refresh = jwt_service
            .create_refresh_token(Uuid::new_v4(), "a@finova.test", UserRole::Member)
            .unwrap();

        assert_matches!(
            jwt_service.extract_user_session(&refresh),
            Err(AuthError::InvalidToken)
        );
        assert!(jwt_service
            .validate_token_kind(&refresh, TokenKind::Refresh)
            .is_ok());
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let issuer = JwtService::with_default_lifetimes("secret-a");
        let verifier = JwtService::with_default_lifetimes("secret-b");
        let token = issuer
            .create_access_token(Uuid::new_v4(), "a@finova.test", UserRole::Admin)
            .unwrap();

        assert_matches!(verifier.validate_token(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_expired_token_is_reported_as_expired() {
        let jwt_service = JwtService::new("test_secret", Duration::minutes(-10), Duration::days(1));
        let token = jwt_service
            .create_access_token(Uuid::new_v4(), "a@finova.test", UserRole::Member)
            .unwrap();

        assert_matches!(jwt_service.validate_token(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn test_token_pair_creation() {
        let jwt_service = JwtService::with_default_lifetimes("test_secret");

        let (access_token, refresh_token) = jwt_service
            .create_token_pair(Uuid::new_v4(), "admin@finova.test", UserRole::Admin)
            .unwrap();

        let access = jwt_service.validate_token(&access_token).unwrap();
        let refresh = jwt_service.validate_token(&refresh_token).unwrap();
        assert_ne!(access.jti, refresh.jti);
        assert!(refresh.exp > access.exp);
    }
}

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::{AccountSession, AuthError, Claims};
use crate::models::AccountType;

/// JWT token service for creating and validating tokens
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_expires_in: Duration,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("encoding_key", &"[REDACTED]")
            .field("decoding_key", &"[REDACTED]")
            .field("token_expires_in", &self.token_expires_in)
            .finish()
    }
}

impl JwtService {
    /// Create a new JWT service with the given secret and token lifetime
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_expires_in: Duration::hours(ttl_hours),
        }
    }

    /// Create an access token for an account
    pub fn create_token(&self, account_id: &str, email: &str, account_type: AccountType) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now + self.token_expires_in;

        let claims = Claims {
            sub: account_id.to_string(),
            email: email.to_string(),
            account_type,
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(AuthError::Jwt)
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

    /// Extract the caller session from a token
    pub fn extract_session(&self, token: &str) -> Result<AccountSession, AuthError> {
        let claims = self.validate_token(token)?;
        AccountSession::from_claims(&claims)
    }

    /// Token lifetime in seconds
    pub fn expires_in_seconds(&self) -> usize {
        self.token_expires_in.num_seconds().max(0) as usize
    }
}

/// Extract bearer token from authorization header
pub fn extract_bearer_token(auth_header: &str) -> Result<&str, AuthError> {
    match auth_header.strip_prefix("Bearer ") {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::InvalidAuthHeaderFormat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_jwt_creation_and_validation() {
        let jwt_service = JwtService::new("test_secret", 6);

        let token = jwt_service
            .create_token("coach-1", "coach@example.com", AccountType::Coach)
            .unwrap();
        let claims = jwt_service.validate_token(&token).unwrap();

        assert_eq!(claims.sub, "coach-1");
        assert_eq!(claims.email, "coach@example.com");
        assert_eq!(claims.account_type, AccountType::Coach);
        assert_eq!(claims.exp - claims.iat, 6 * 3600);
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(extract_bearer_token("Bearer test_token").unwrap(), "test_token");

        assert!(extract_bearer_token("Invalid header").is_err());
        assert!(extract_bearer_token("Bearer ").is_err());
    }

    #[test]
    fn test_session_extraction() {
        let jwt_service = JwtService::new("test_secret", 6);
        let token = jwt_service
            .create_token("cust-1", "client@example.com", AccountType::Customer)
            .unwrap();

        let session = jwt_service.extract_session(&token).unwrap();

        assert_eq!(session.account_id, "cust-1");
        assert_eq!(session.account_type, AccountType::Customer);
        assert!(!session.is_coach());
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let token = JwtService::new("one", 6)
            .create_token("coach-1", "coach@example.com", AccountType::Coach)
            .unwrap();

        assert_matches!(JwtService::new("two", 6).validate_token(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_expired_token() {
        let jwt_service = JwtService::new("test_secret", -1);
        let token = jwt_service
            .create_token("coach-1", "coach@example.com", AccountType::Coach)
            .unwrap();

        assert_matches!(jwt_service.validate_token(&token), Err(AuthError::TokenExpired));
    }
}

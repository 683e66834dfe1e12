use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::auth::AuthError;
use crate::models::{AccountProfile, AccountType};

/// JWT token claims
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: String,                // Subject (account ID)
    pub email: String,              // Account email
    pub account_type: AccountType,  // COACH or CUSTOMER
    pub exp: usize,                 // Expiration time
    pub iat: usize,                 // Issued at
    pub jti: String,                // JWT ID
}

/// Authentication request models
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[schemars(length(min = 1))]
    pub name: String,
    #[schemars(email)]
    pub email: String,
    #[schemars(length(min = 1))]
    pub password: String,
    pub account_type: AccountType,
    /// Unassigned subscription id; required for coaches.
    pub activation_key: Option<String>,
    /// Required for customers.
    pub coach_id: Option<String>,
    pub account_image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[schemars(email)]
    pub email: String,
    #[schemars(length(min = 1))]
    pub password: String,
}

/// Authentication response models
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: usize,
    pub account: AccountProfile,
}

/// Authenticated caller, resolved by the auth middleware.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSession {
    pub account_id: String,
    pub email: String,
    pub account_type: AccountType,
    pub jti: String,
}

impl AccountSession {
    pub fn from_claims(claims: &Claims) -> Result<Self, AuthError> {
        if claims.sub.is_empty() {
            return Err(AuthError::InvalidToken);
        }

        Ok(Self {
            account_id: claims.sub.clone(),
            email: claims.email.clone(),
            account_type: claims.account_type,
            jti: claims.jti.clone(),
        })
    }

    pub fn is_coach(&self) -> bool {
        self.account_type == AccountType::Coach
    }

    pub fn require_coach(&self) -> Result<(), AuthError> {
        if self.is_coach() {
            Ok(())
        } else {
            Err(AuthError::InsufficientPermissions)
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AccountSession
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AccountSession>()
            .cloned()
            .ok_or(AuthError::MissingAuthHeader)
    }
}

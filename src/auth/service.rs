use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::{AccountSession, AuthError, AuthResponse, JwtService, LoginRequest, RegisterRequest};
use crate::models::{new_id, Account, AccountProfile, AccountType, Subscription};
use crate::services::{NotificationOutbox, OutboundNotification};
use crate::store::{self, Entity, Filter, Page, Store, StoreError};

#[derive(Clone)]
pub struct AuthService {
    jwt_service: JwtService,
    store: Arc<dyn Store>,
    outbox: NotificationOutbox,
    hash_cost: u32,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("jwt_service", &self.jwt_service)
            .field("hash_cost", &self.hash_cost)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, jwt_service: JwtService, outbox: NotificationOutbox, hash_cost: u32) -> Self {
        Self {
            jwt_service,
            store,
            outbox,
            hash_cost,
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt_service
    }

    /// Register a new account.
    ///
    /// Coaches redeem an unassigned subscription as their activation key;
    /// customers must name an existing coach.
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AuthError> {
        let password_hash = self.hash(&request.password)?;

        if self.find_by_email(&request.email).await?.is_some() {
            return Err(AuthError::EmailAlreadyExists);
        }

        let activation_key = match request.account_type {
            AccountType::Coach => {
                let key = request.activation_key.clone().ok_or(AuthError::ActivationKeyRequired)?;
                self.unassigned_subscription(&key).await?;
                Some(key)
            }
            AccountType::Customer => {
                let coach_id = request.coach_id.as_deref().ok_or(AuthError::CoachRequired)?;
                self.coach(coach_id).await?;
                None
            }
        };

        let now = Utc::now();
        let account = Account {
            id: new_id(),
            name: request.name,
            email: request.email,
            password_hash,
            account_type: request.account_type,
            coach_id: match request.account_type {
                AccountType::Customer => request.coach_id,
                AccountType::Coach => None,
            },
            account_image_url: request.account_image_url,
            created_at: now,
            updated_at: now,
        };

        let account = store::in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let account = store::insert(tx, &account).await?;

                if let Some(key) = activation_key {
                    let changes = store::to_row(&json!({
                        "accountId": account.id,
                        "active": true,
                        "activatedAt": now,
                        "updatedAt": now,
                    }))?;
                    // Claimed only while still unassigned, so one key activates one coach.
                    tx.update_where(Subscription::TABLE, &key, &Subscription::unassigned_filters(), changes)
                        .await?
                        .ok_or(AuthError::InvalidActivationKey)?;
                }

                Ok::<_, AuthError>(account)
            })
        })
        .await
        .map_err(|err| match err {
            AuthError::Store(StoreError::UniqueViolation(_)) => AuthError::EmailAlreadyExists,
            AuthError::Store(StoreError::Conflict(_)) => AuthError::InvalidActivationKey,
            other => other,
        })?;

        tracing::info!(account_id = %account.id, account_type = account.account_type.as_str(), "account registered");

        self.outbox.publish(OutboundNotification::new(
            account.id.as_str(),
            "Welcome",
            format!("Welcome to Iron Atlas, {}", account.name),
        ));
        if let Some(coach_id) = &account.coach_id {
            self.outbox.publish(OutboundNotification::new(
                coach_id.as_str(),
                "New client",
                format!("{} joined as your client", account.name),
            ));
        }

        self.respond(account)
    }

    /// Login with email and password.
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        let account = self
            .find_by_email(&request.email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&request.password, &account.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        tracing::info!(account_id = %account.id, "account logged in");

        self.respond(account)
    }

    /// Resolves a bearer token to the caller; the account must still exist.
    pub async fn authenticate(&self, token: &str) -> Result<AccountSession, AuthError> {
        let session = self.jwt_service.extract_session(token)?;

        if store::find::<Account, _>(self.store.as_ref(), &session.account_id)
            .await?
            .is_none()
        {
            return Err(AuthError::InvalidToken);
        }

        Ok(session)
    }

    /// Current profile of the caller.
    pub async fn verify(&self, session: &AccountSession) -> Result<AccountProfile, AuthError> {
        store::find::<Account, _>(self.store.as_ref(), &session.account_id)
            .await?
            .map(AccountProfile::from)
            .ok_or(AuthError::AccountNotFound)
    }

    /// Hashes a new password, rejecting ones that fail the strength policy.
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        hash_password(password, self.hash_cost).map_err(|err| {
            if err.is_policy_violation() {
                AuthError::PasswordValidation(err.to_string())
            } else {
                AuthError::PasswordHashing(err)
            }
        })
    }

    fn respond(&self, account: Account) -> Result<AuthResponse, AuthError> {
        let token = self
            .jwt_service
            .create_token(&account.id, &account.email, account.account_type)?;

        Ok(AuthResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.expires_in_seconds(),
            account: account.into(),
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AuthError> {
        let accounts = store::list::<Account, _>(self.store.as_ref(), &[Filter::equals("email", email)], Page::all()).await?;

        Ok(accounts.into_iter().next())
    }

    async fn unassigned_subscription(&self, key: &str) -> Result<Subscription, AuthError> {
        store::find::<Subscription, _>(self.store.as_ref(), key)
            .await?
            .filter(Subscription::is_unassigned)
            .ok_or(AuthError::InvalidActivationKey)
    }

    async fn coach(&self, coach_id: &str) -> Result<Account, AuthError> {
        store::find::<Account, _>(self.store.as_ref(), coach_id)
            .await?
            .filter(|account| account.account_type == AccountType::Coach)
            .ok_or(AuthError::InvalidCoach)
    }
}

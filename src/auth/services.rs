use std::sync::Arc;

use lazy_static::lazy_static;
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        claims::{Identity, TokenKind},
        jwt::{JwtKeys, TokenError, TokenPair},
        password::{
            hash_password, is_strong_password, is_valid_email, verify_password,
            PASSWORD_POLICY_MESSAGE,
        },
        repo::{StoreError, UserStore},
        repo_types::{NewUser, User},
    },
    config::AuthPolicyConfig,
    error::ApiError,
};

lazy_static! {
    /// Verified against when no account matches, so a miss costs the same as a wrong password.
    static ref DUMMY_HASH: String = hash_password("dummy-password-for-timing").unwrap_or_default();
}

/// Input for self-registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

/// Registration, login, refresh rotation and logout over one [`UserStore`].
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    keys: JwtKeys,
    policy: Arc<AuthPolicyConfig>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, keys: JwtKeys, policy: AuthPolicyConfig) -> Self {
        Self {
            users,
            keys,
            policy: Arc::new(policy),
        }
    }

    #[instrument(skip(self, input))]
    pub async fn register(&self, input: Registration) -> Result<User, ApiError> {
        let email = normalize_email(&input.email);
        let username = input.username.trim().to_string();
        let phone = input.phone.trim().to_string();

        if username.is_empty() || phone.is_empty() {
            return Err(ApiError::Validation(
                "Username, email, phone and password are required".into(),
            ));
        }
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(ApiError::Validation("Invalid email format".into()));
        }
        if !is_strong_password(&input.password) {
            warn!(email = %email, "weak password");
            return Err(ApiError::Validation(PASSWORD_POLICY_MESSAGE.into()));
        }

        // Advisory only: the unique index on email is what actually guards duplicates.
        if self.users.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(ApiError::DuplicateEmail);
        }

        let password_hash =
            hash_password(&input.password).map_err(|e| ApiError::Internal(e.to_string()))?;

        let user = self
            .users
            .create(NewUser {
                username,
                email,
                phone,
                password_hash,
                role: self.policy.registration_role,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => ApiError::DuplicateEmail,
                other => ApiError::StoreUnavailable(other),
            })?;

        info!(user_id = user.id, email = %user.email, role = %user.role, "user registered");
        Ok(user)
    }

    /// `identifier` is an email, or a username/phone when it has no `@`.
    #[instrument(skip(self, password))]
    pub async fn login(&self, identifier: &str, password: &str) -> Result<(TokenPair, User), ApiError> {
        let identifier = identifier.trim();
        if identifier.is_empty() || password.is_empty() {
            return Err(ApiError::Validation(
                "Login identifier and password are required".into(),
            ));
        }

        // Usernames and phones are not unique, so every holder gets a password check.
        let candidates: Vec<User> = if identifier.contains('@') {
            self.users
                .find_by_email(&normalize_email(identifier))
                .await?
                .into_iter()
                .collect()
        } else {
            self.users.find_by_login(identifier).await?
        };

        if candidates.is_empty() {
            let _ = verify_password(password, &DUMMY_HASH);
            warn!("login unknown identifier");
            return Err(ApiError::InvalidCredentials);
        }
        let user = match candidates
            .into_iter()
            .find(|u| verify_password(password, &u.password_hash))
        {
            Some(u) => u,
            None => {
                warn!("login invalid password");
                return Err(ApiError::InvalidCredentials);
            }
        };

        if !user.password_valid {
            warn!(user_id = user.id, "login with password awaiting reset");
            return Err(ApiError::PasswordResetRequired);
        }
        if let Some(required) = self.policy.login_required_role {
            if user.role != required {
                warn!(user_id = user.id, role = %user.role, %required, "login role not permitted");
                return Err(ApiError::RoleNotPermitted { required });
            }
        }

        let pair = self.issue(&user, OffsetDateTime::now_utc())?;
        self.users
            .set_refresh_token(user.id, &pair.refresh_token, pair.refresh_expires_at)
            .await?;

        info!(user_id = user.id, email = %user.email, "user logged in");
        Ok((pair, user))
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        self.refresh_at(refresh_token, OffsetDateTime::now_utc()).await
    }

    /// Rotates the session: the presented token stops working once this returns.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_at(
        &self,
        refresh_token: &str,
        now: OffsetDateTime,
    ) -> Result<TokenPair, ApiError> {
        let claims = self
            .keys
            .verify_kind_at(refresh_token, TokenKind::Refresh, now)
            .map_err(|e| {
                warn!(error = %e, "invalid refresh token");
                ApiError::InvalidRefreshToken(e)
            })?;

        let user = self
            .users
            .find_by_refresh_token(refresh_token, now)
            .await?
            .ok_or_else(|| {
                warn!(user_id = claims.user_id, "refresh token not on record");
                ApiError::TokenRevoked
            })?;

        if user.id != claims.user_id {
            error!(claimed = claims.user_id, stored = user.id, "refresh token user mismatch");
            return Err(ApiError::TokenUserMismatch);
        }

        let pair = self.issue(&user, now)?;
        let rotated = self
            .users
            .rotate_refresh_token(
                user.id,
                refresh_token,
                &pair.refresh_token,
                pair.refresh_expires_at,
            )
            .await?;
        if !rotated {
            warn!(user_id = user.id, "refresh token rotated concurrently");
            return Err(ApiError::TokenRevoked);
        }

        info!(user_id = user.id, "token refreshed");
        Ok(pair)
    }

    /// Clearing an already empty session is fine.
    #[instrument(skip(self))]
    pub async fn logout(&self, user_id: i32) -> Result<(), ApiError> {
        self.users.clear_refresh_token(user_id).await?;
        info!(user_id, "user logged out");
        Ok(())
    }

    /// Self-service password change; also the way out of the reset-required state.
    #[instrument(skip(self, current_password, new_password))]
    pub async fn change_password(
        &self,
        email: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        if !is_strong_password(new_password) {
            return Err(ApiError::Validation(PASSWORD_POLICY_MESSAGE.into()));
        }
        let user = match self.users.find_by_email(&normalize_email(email)).await? {
            Some(u) if verify_password(current_password, &u.password_hash) => u,
            _ => {
                warn!("change password with bad credentials");
                return Err(ApiError::InvalidCredentials);
            }
        };

        let hash = hash_password(new_password).map_err(|e| ApiError::Internal(e.to_string()))?;
        self.users.update_password(user.id, &hash, true).await?;
        self.users.clear_refresh_token(user.id).await?;
        info!(user_id = user.id, "password changed");
        Ok(())
    }

    /// Sets a temporary password the owner must replace before logging in again.
    #[instrument(skip(self, caller, temporary_password), fields(caller = caller.user_id))]
    pub async fn admin_reset_password(
        &self,
        caller: &Identity,
        email: &str,
        temporary_password: &str,
    ) -> Result<(), ApiError> {
        let required = self.policy.reset_required_role;
        if caller.role != required {
            warn!(role = %caller.role, %required, "password reset by non-admin");
            return Err(ApiError::RoleNotPermitted { required });
        }
        if !is_strong_password(temporary_password) {
            return Err(ApiError::Validation(PASSWORD_POLICY_MESSAGE.into()));
        }
        let user = self
            .users
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or_else(|| ApiError::NotFound("User".into()))?;

        let hash =
            hash_password(temporary_password).map_err(|e| ApiError::Internal(e.to_string()))?;
        self.users.update_password(user.id, &hash, false).await?;
        self.users.clear_refresh_token(user.id).await?;
        info!(user_id = user.id, "password reset by administrator");
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        Ok(self.users.list().await?)
    }

    fn issue(&self, user: &User, now: OffsetDateTime) -> Result<TokenPair, ApiError> {
        self.keys
            .issue_pair_at(&Identity::from(user), now)
            .map_err(|e: TokenError| {
                error!(error = %e, user_id = user.id, "jwt sign failed");
                ApiError::Internal(e.to_string())
            })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

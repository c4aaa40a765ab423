use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::auth::{
    jwt::TokenPair,
    repo_types::{Role, User},
};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(alias = "userName", alias = "username")]
    pub user_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

/// Request body for login. `email` may also carry a username or phone.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "login")]
    pub email: String,
    #[serde(alias = "pwd")]
    pub password: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(alias = "refreshToken")]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub email: String,
    #[serde(alias = "pwd")]
    pub current_password: String,
    #[serde(alias = "newPwd")]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    #[serde(alias = "newPwd")]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: i32,
    pub user_name: String,
    pub email: String,
    pub role: Role,
    pub expires_in: i64,
}

impl LoginResponse {
    pub fn new(pair: TokenPair, user: &User) -> Self {
        Self {
            expires_in: pair.expires_in(),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            user_id: user.id,
            user_name: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

impl From<TokenPair> for RefreshResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            expires_in: pair.expires_in(),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user_id: i32,
    pub user_name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub password_valid: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            user_id: u.id,
            user_name: u.username,
            email: u.email,
            phone: u.phone,
            role: u.role,
            password_valid: u.password_valid,
            created_at: u.created_at,
        }
    }
}

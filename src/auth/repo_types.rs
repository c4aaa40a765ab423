use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use time::OffsetDateTime;

/// Closed set of role tags a user can carry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    SuperAdmin,
    Hr,
    DeptHead,
    EmpManager,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::Hr => "HR",
            Role::DeptHead => "DEPT_HEAD",
            Role::EmpManager => "EMP_MANAGER",
            Role::User => "USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown role `{0}`")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "SUPER_ADMIN" => Ok(Role::SuperAdmin),
            "HR" => Ok(Role::Hr),
            "DEPT_HEAD" => Ok(Role::DeptHead),
            "EMP_MANAGER" => Ok(Role::EmpManager),
            "USER" => Ok(Role::User),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Raw row of the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub user_id: i32,
    pub user_name: String,
    pub email: String,
    pub phone: String,
    pub pass: String,
    pub pss_valid: bool,
    pub role: String,
    pub refresh_token: String,
    pub refresh_token_exp: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// User record as the rest of the crate sees it.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, never exposed in JSON
    pub password_valid: bool,
    pub role: Role,
    #[serde(skip_serializing)]
    pub refresh_token: String, // empty when no session is active
    #[serde(skip_serializing)]
    pub refresh_token_exp: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = UnknownRole;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.user_id,
            username: r.user_name,
            email: r.email,
            phone: r.phone,
            password_hash: r.pass,
            password_valid: r.pss_valid,
            role: r.role.parse()?,
            refresh_token: r.refresh_token,
            refresh_token_exp: r.refresh_token_exp,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Fields needed to insert a user; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub role: Role,
}

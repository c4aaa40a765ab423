use serde::Deserialize;
use tracing::warn;

use crate::auth::repo_types::Role;

pub const INSECURE_DEFAULT_SECRET: &str = "default-secret-key-please-change-in-production";

const DEFAULT_BYPASS_PATHS: &[&str] = &[
    "/",
    "/health",
    "/auth/register",
    "/auth/login",
    "/auth/refresh",
    "/auth/change-password",
    "/swagger",
];

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_hours: i64,
    /// Set when `JWT_SECRET` was missing and the well-known fallback is in use.
    #[serde(default)]
    pub insecure_default: bool,
}

impl JwtConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let (secret, insecure_default) = match get("JWT_SECRET") {
            Some(s) if !s.trim().is_empty() => (s, false),
            _ => (INSECURE_DEFAULT_SECRET.to_string(), true),
        };
        Self {
            secret,
            issuer: get("JWT_ISSUER").unwrap_or_else(|| "satcom-backend".into()),
            audience: get("JWT_AUDIENCE").unwrap_or_else(|| "satcom-clients".into()),
            access_ttl_minutes: positive_or(get("ACCESS_TOKEN_DURATION_MINUTES"), 15),
            refresh_ttl_hours: positive_or(get("REFRESH_TOKEN_DURATION_HOURS"), 168),
            insecure_default,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthPolicyConfig {
    pub bypass_paths: Vec<String>,
    /// Role stamped on every self-registered account.
    pub registration_role: Role,
    /// Role the login endpoint demands; `None` lets every role through.
    pub login_required_role: Option<Role>,
    /// Role allowed to reset another user's password. Always enforced.
    pub reset_required_role: Role,
}

impl AuthPolicyConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(env_lookup)
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bypass_paths = match get("AUTH_BYPASS_PATHS") {
            Some(raw) => parse_path_list(&raw),
            None => default_bypass_paths(),
        };
        let registration_role = get("REGISTRATION_ROLE")
            .map(|v| v.parse::<Role>())
            .transpose()?
            .unwrap_or(Role::Admin);
        let login_required_role = match get("LOGIN_REQUIRED_ROLE") {
            Some(v) if v.trim().is_empty() => None,
            Some(v) => Some(v.parse::<Role>()?),
            None => Some(Role::Admin),
        };
        let reset_required_role = match get("RESET_REQUIRED_ROLE") {
            Some(v) if !v.trim().is_empty() => v.parse::<Role>()?,
            _ => Role::Admin,
        };
        Ok(Self {
            bypass_paths,
            registration_role,
            login_required_role,
            reset_required_role,
        })
    }
}

impl Default for AuthPolicyConfig {
    fn default() -> Self {
        Self {
            bypass_paths: default_bypass_paths(),
            registration_role: Role::Admin,
            login_required_role: Some(Role::Admin),
            reset_required_role: Role::Admin,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub production: bool,
    pub jwt: JwtConfig,
    pub auth: AuthPolicyConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(env_lookup)
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let config = Self {
            database_url: get("DATABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?,
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: get("APP_PORT")
                .and_then(|v| v.trim().parse::<u16>().ok())
                .unwrap_or(7070),
            production: get("APP_ENV")
                .map(|v| v.trim().eq_ignore_ascii_case("production"))
                .unwrap_or(false),
            jwt: JwtConfig::from_lookup(&get),
            auth: AuthPolicyConfig::from_lookup(&get)?,
        };

        if config.jwt.insecure_default {
            warn!(
                "JWT_SECRET is not set; tokens are signed with the well-known fallback secret"
            );
            if config.production {
                anyhow::bail!("refusing to start in production with the fallback JWT secret");
            }
        }
        Ok(config)
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn default_bypass_paths() -> Vec<String> {
    DEFAULT_BYPASS_PATHS.iter().map(|p| p.to_string()).collect()
}

fn positive_or(raw: Option<String>, default: i64) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

fn parse_path_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| p.to_string())
        .collect()
}

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::{
    auth::claims::{Claims, Identity, TokenKind},
    config::JwtConfig,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    Malformed,
    #[error("token signature is invalid")]
    SignatureInvalid,
    #[error("invalid token type: expected {expected} token")]
    WrongType { expected: TokenKind },
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName => TokenError::SignatureInvalid,
            _ => TokenError::Malformed,
        }
    }
}

/// Freshly signed access/refresh tokens for one login.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: OffsetDateTime,
    pub refresh_expires_at: OffsetDateTime,
    pub access_ttl: Duration,
}

impl TokenPair {
    /// Access token lifetime in whole seconds, as reported to clients.
    pub fn expires_in(&self) -> i64 {
        self.access_ttl.whole_seconds()
    }
}

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::minutes(cfg.access_ttl_minutes),
            refresh_ttl: Duration::hours(cfg.refresh_ttl_hours),
        }
    }

    pub fn issue_pair(&self, identity: &Identity) -> Result<TokenPair, TokenError> {
        self.issue_pair_at(identity, OffsetDateTime::now_utc())
    }

    pub fn issue_pair_at(
        &self,
        identity: &Identity,
        now: OffsetDateTime,
    ) -> Result<TokenPair, TokenError> {
        let (access_token, access_expires_at) = self.sign(identity, TokenKind::Access, now)?;
        let (refresh_token, refresh_expires_at) = self.sign(identity, TokenKind::Refresh, now)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
            access_ttl: self.access_ttl,
        })
    }

    fn sign(
        &self,
        identity: &Identity,
        kind: TokenKind,
        now: OffsetDateTime,
    ) -> Result<(String, OffsetDateTime), TokenError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let exp = now + ttl;
        let claims = Claims {
            sub: identity.user_id.to_string(),
            user_id: identity.user_id,
            email: identity.email.clone(),
            username: identity.username.clone(),
            role: identity.role,
            kind,
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: format!("{:032x}", rand::random::<u128>()),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        debug!(user_id = identity.user_id, %kind, "jwt signed");
        Ok((token, exp))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, OffsetDateTime::now_utc())
    }

    /// Checks signature, algorithm, issuer and audience, then expiry against `now`.
    pub fn verify_at(&self, token: &str, now: OffsetDateTime) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));

        let claims = decode::<Claims>(token, &self.decoding, &validation)?.claims;
        if now.unix_timestamp() > claims.exp {
            return Err(TokenError::Expired);
        }
        debug!(user_id = claims.user_id, kind = %claims.kind, "jwt verified");
        Ok(claims)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_kind_at(token, TokenKind::Access, OffsetDateTime::now_utc())
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_kind_at(token, TokenKind::Refresh, OffsetDateTime::now_utc())
    }

    pub fn verify_kind_at(
        &self,
        token: &str,
        expected: TokenKind,
        now: OffsetDateTime,
    ) -> Result<Claims, TokenError> {
        let claims = self.verify_at(token, now)?;
        if claims.kind != expected {
            return Err(TokenError::WrongType { expected });
        }
        Ok(claims)
    }
}

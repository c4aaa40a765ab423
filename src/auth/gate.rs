use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::{auth::claims::Identity, error::ApiError, state::AppState};

/// Paths served without a token.
///
/// An entry matches the identical path and anything below it on a segment
/// boundary, so `/swagger` admits `/swagger/index.html` but not `/swaggerx`.
/// The root entry `/` only ever matches `/` itself.
#[derive(Debug, Clone)]
pub struct BypassList {
    paths: Vec<String>,
}

impl BypassList {
    pub fn new(paths: &[String]) -> Self {
        let paths = paths
            .iter()
            .map(|p| {
                let trimmed = p.trim().trim_end_matches('/');
                if trimmed.is_empty() {
                    "/".to_string()
                } else {
                    trimmed.to_string()
                }
            })
            .collect();
        Self { paths }
    }

    pub fn allows(&self, path: &str) -> bool {
        self.paths.iter().any(|entry| {
            path == entry
                || (entry != "/"
                    && path
                        .strip_prefix(entry.as_str())
                        .map_or(false, |rest| rest.starts_with('/')))
        })
    }
}

/// Verified identity of the caller, placed in request extensions by [`access_gate`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(ApiError::MissingAuthorization)
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let raw = headers
        .get(AUTHORIZATION)
        .ok_or(ApiError::MissingAuthorization)?
        .to_str()
        .map_err(|_| ApiError::MalformedAuthorizationHeader)?;
    if raw.trim().is_empty() {
        return Err(ApiError::MissingAuthorization);
    }
    let token = raw
        .strip_prefix("Bearer ")
        .or_else(|| raw.strip_prefix("bearer "))
        .ok_or(ApiError::MalformedAuthorizationHeader)?
        .trim();
    if token.is_empty() {
        return Err(ApiError::MalformedAuthorizationHeader);
    }
    Ok(token)
}

/// Runs ahead of every route: bypass, or demand a valid access token.
pub async fn access_gate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = req.uri().path();
    if state.bypass.allows(path) {
        debug!(path, "auth bypass");
        return Ok(next.run(req).await);
    }

    let claims = {
        let token = bearer_token(req.headers()).map_err(|e| {
            warn!(path, error = %e, "rejected request");
            e
        })?;
        state.keys.verify_access(token).map_err(|e| {
            warn!(path, error = %e, "invalid or expired token");
            ApiError::Unauthorized(e)
        })?
    };

    req.extensions_mut().insert(CurrentUser(claims.identity()));
    Ok(next.run(req).await)
}

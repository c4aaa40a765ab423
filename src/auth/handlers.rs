use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        claims::Identity,
        dto::{
            ChangePasswordRequest, LoginRequest, LoginResponse, RefreshRequest, RefreshResponse,
            RegisterRequest, ResetPasswordRequest, UserResponse,
        },
        gate::CurrentUser,
        services::{AuthService, Registration},
    },
    error::{ApiError, ApiResponse},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/change-password", post(change_password))
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(get_me))
        .route("/auth/users", get(list_users))
        .route("/auth/resetpwd", post(reset_password))
}

/// Turns axum's plain-text body rejection into the API envelope.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(v)| v).map_err(|e| {
        warn!(error = %e, "invalid request body");
        ApiError::Validation("Invalid request body".into())
    })
}

#[instrument(skip(auth, payload))]
pub async fn register(
    State(auth): State<AuthService>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    let req = json_body(payload)?;
    let user = auth
        .register(Registration {
            username: req.user_name,
            email: req.email,
            phone: req.phone,
            password: req.password,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("User registered successfully", user.into())),
    ))
}

#[instrument(skip(auth, payload))]
pub async fn login(
    State(auth): State<AuthService>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let req = json_body(payload)?;
    let (pair, user) = auth.login(&req.email, &req.password).await?;
    Ok(Json(ApiResponse::ok(
        "Login successful",
        LoginResponse::new(pair, &user),
    )))
}

#[instrument(skip(auth, payload))]
pub async fn refresh(
    State(auth): State<AuthService>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<RefreshResponse>>, ApiError> {
    let req = json_body(payload)?;
    if req.refresh_token.trim().is_empty() {
        return Err(ApiError::Validation("Refresh token is required".into()));
    }
    let pair = auth.refresh(req.refresh_token.trim()).await?;
    Ok(Json(ApiResponse::ok(
        "Token refreshed successfully",
        pair.into(),
    )))
}

#[instrument(skip(auth, who), fields(user_id = who.user_id))]
pub async fn logout(
    State(auth): State<AuthService>,
    CurrentUser(who): CurrentUser,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    auth.logout(who.user_id).await?;
    Ok(Json(ApiResponse::message(true, "Logout successful")))
}

#[instrument(skip(auth, payload))]
pub async fn change_password(
    State(auth): State<AuthService>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let req = json_body(payload)?;
    auth.change_password(&req.email, &req.current_password, &req.new_password)
        .await?;
    Ok(Json(ApiResponse::message(true, "Password changed successfully")))
}

#[instrument(skip(auth, who, payload), fields(caller = who.user_id))]
pub async fn reset_password(
    State(auth): State<AuthService>,
    CurrentUser(who): CurrentUser,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let req = json_body(payload)?;
    auth.admin_reset_password(&who, &req.email, &req.new_password)
        .await?;
    Ok(Json(ApiResponse::message(true, "Password reset successfully")))
}

pub async fn get_me(CurrentUser(who): CurrentUser) -> Json<ApiResponse<Identity>> {
    Json(ApiResponse::ok("Current user", who))
}

#[instrument(skip(auth))]
pub async fn list_users(
    State(auth): State<AuthService>,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, ApiError> {
    let users = auth.list_users().await?;
    Ok(Json(ApiResponse::ok(
        "Users retrieved successfully",
        users.into_iter().map(UserResponse::from).collect(),
    )))
}

#[cfg(test)]
mod tests {
    use crate::{app::build_app, state::AppState};
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn sample_user() -> Value {
        json!({"user_name": "a", "email": "a@x.com", "phone": "555", "password": "Abcdef1!"})
    }

    async fn login(app: &Router) -> Value {
        let (status, body) = send(
            app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "a@x.com", "password": "Abcdef1!"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["payload"].clone()
    }

    #[tokio::test]
    async fn register_returns_created_summary() {
        let app = build_app(AppState::fake());
        let (status, body) =
            send(&app, Method::POST, "/auth/register", None, Some(sample_user())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["isSuccess"], true);
        assert_eq!(body["payload"]["email"], "a@x.com");
        assert_eq!(body["payload"]["role"], "ADMIN");
        assert_eq!(body["payload"]["password_valid"], true);
        assert!(body["payload"].get("password_hash").is_none());
        assert!(body["payload"].get("pass").is_none());
    }

    #[tokio::test]
    async fn register_twice_conflicts() {
        let app = build_app(AppState::fake());
        send(&app, Method::POST, "/auth/register", None, Some(sample_user())).await;
        let (status, body) =
            send(&app, Method::POST, "/auth/register", None, Some(sample_user())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "User with this email already exists");
    }

    #[tokio::test]
    async fn garbage_body_is_a_structured_400() {
        let app = build_app(AppState::fake());
        let (status, body) =
            send(&app, Method::POST, "/auth/register", None, Some(json!({"email": 1}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["isSuccess"], false);
        assert_eq!(body["message"], "Invalid request body");
    }

    #[tokio::test]
    async fn login_failures_share_one_body() {
        let app = build_app(AppState::fake());
        send(&app, Method::POST, "/auth/register", None, Some(sample_user())).await;

        let (s1, wrong_pw) = send(
            &app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "a@x.com", "password": "Nope123!"})),
        )
        .await;
        let (s2, no_user) = send(
            &app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "ghost@x.com", "password": "Abcdef1!"})),
        )
        .await;
        assert_eq!(s1, StatusCode::UNAUTHORIZED);
        assert_eq!(s2, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_pw["message"], no_user["message"]);
        assert_eq!(wrong_pw["isSuccess"], no_user["isSuccess"]);
    }

    #[tokio::test]
    async fn login_returns_tokens_and_summary() {
        let app = build_app(AppState::fake());
        send(&app, Method::POST, "/auth/register", None, Some(sample_user())).await;
        let payload = login(&app).await;
        assert!(payload["access_token"].as_str().unwrap().len() > 20);
        assert!(payload["refresh_token"].as_str().unwrap().len() > 20);
        assert_eq!(payload["user_name"], "a");
        assert_eq!(payload["role"], "ADMIN");
        assert_eq!(payload["expires_in"], 900);
    }

    #[tokio::test]
    async fn logout_then_refresh_is_rejected() {
        let app = build_app(AppState::fake());
        send(&app, Method::POST, "/auth/register", None, Some(sample_user())).await;
        let payload = login(&app).await;
        let access = payload["access_token"].as_str().unwrap();
        let refresh = payload["refresh_token"].as_str().unwrap();

        let (status, _) = send(&app, Method::POST, "/auth/logout", Some(access), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({"refresh_token": refresh})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid or expired refresh token");
    }

    #[tokio::test]
    async fn logout_requires_a_token() {
        let app = build_app(AppState::fake());
        let (status, body) = send(&app, Method::POST, "/auth/logout", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["isSuccess"], false);
    }

    #[tokio::test]
    async fn refresh_endpoint_rotates() {
        let app = build_app(AppState::fake());
        send(&app, Method::POST, "/auth/register", None, Some(sample_user())).await;
        let payload = login(&app).await;
        let refresh = payload["refresh_token"].as_str().unwrap();

        let (status, body) = send(
            &app,
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({"refresh_token": refresh})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_ne!(body["payload"]["refresh_token"], refresh);
        assert_eq!(body["payload"]["expires_in"], 900);
    }

    #[tokio::test]
    async fn me_and_users_behind_the_gate() {
        let app = build_app(AppState::fake());
        send(&app, Method::POST, "/auth/register", None, Some(sample_user())).await;
        let payload = login(&app).await;
        let access = payload["access_token"].as_str().unwrap();

        let (status, me) = send(&app, Method::GET, "/auth/me", Some(access), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["payload"]["email"], "a@x.com");

        let (status, users) = send(&app, Method::GET, "/auth/users", Some(access), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(users["payload"].as_array().unwrap().len(), 1);

        let (status, _) = send(&app, Method::GET, "/auth/users", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

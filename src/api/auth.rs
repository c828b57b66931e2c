/// Account endpoints and bearer-token authentication
///
/// `POST /auth/register` and `POST /auth/login` are public. `GET /me` and all
/// workflow routes require `Authorization: Bearer <token>`; the middleware
/// puts the validated [`Claims`] into the request extensions.

use crate::api::{ApiError, AppState};
use crate::auth::{Claims, User};
use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request body for register and login
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl CredentialsRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(ApiError::BadRequest("email and password are required".to_string()));
        }
        Ok(())
    }
}

/// Successful login: the token plus the account it belongs to
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public account routes
pub fn create_auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// Routes for the authenticated caller; mount behind [`require_auth`]
pub fn create_me_routes() -> Router<AppState> {
    Router::new().route("/me", get(me))
}

/// Reject requests without a valid bearer token
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or(ApiError::Unauthorized)?;
    let claims = state.auth.validate(token)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Token from `Authorization: Bearer <token>`, scheme matched case-insensitively
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// POST /auth/register
/// Body: { "email": "...", "password": "..." }
async fn register(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    req.validate()?;

    let user = state.auth.register(state.deadline(), &req.email, &req.password).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /auth/login
async fn login(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(req) = payload?;
    req.validate()?;

    let (user, token) = state.auth.login(state.deadline(), &req.email, &req.password).await?;
    tracing::info!("🔑 User {} logged in", user.id);

    Ok(Json(LoginResponse {
        token,
        id: user.id,
        email: user.email,
        created_at: user.created_at,
        updated_at: user.updated_at,
    }))
}

/// GET /me
async fn me(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> Result<Json<User>, ApiError> {
    let user = state.auth.get_user(state.deadline(), &claims.sub).await?;
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("BEARER   abc.def ")), Some("abc.def"));
    }

    #[test]
    fn other_headers_are_rejected() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwdw==")), None);
        assert_eq!(bearer_token(&headers("Bearer")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&headers("Bearerabc")), None);
    }
}

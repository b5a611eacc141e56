use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::CookieJar;

use crate::{
    adapters::http::app_state::AppState, app_error::AppError, application::jwt,
    domain::entities::entitlement::UserId,
};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Caller identity re-validated from the session token on every request.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserId);

/// Bearer token first, `access_token` cookie second.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(AUTHORIZATION)
        && let Ok(value) = value.to_str()
        && let Some(token) = value.strip_prefix("Bearer ")
        && !token.trim().is_empty()
    {
        return Some(token.trim().to_string());
    }
    CookieJar::from_headers(headers)
        .get(ACCESS_TOKEN_COOKIE)
        .map(|c| c.value().to_owned())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or(AppError::InvalidCredentials)?;
        let user_id = jwt::verify(&token, &state.config.identity_jwt_secret)?;
        Ok(AuthUser(user_id))
    }
}

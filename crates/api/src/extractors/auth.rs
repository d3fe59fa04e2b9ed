use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use imhere_services::Session;

use crate::{error::ApiError, state::AppState};

/// The caller's session, from a bearer token or the `access_token` cookie.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Session);

impl std::ops::Deref for AuthUser {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.0
    }
}

pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    // Authorization header first, then the cookie
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
        .or_else(|| {
            headers
                .get(header::COOKIE)
                .and_then(|v| v.to_str().ok())
                .and_then(|cookies| {
                    cookies.split(';').find_map(|cookie| {
                        cookie
                            .trim()
                            .strip_prefix("access_token=")
                            .filter(|s| !s.is_empty())
                            .map(|s| s.to_string())
                    })
                })
        })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("No token provided".to_string()))?;

        Ok(AuthUser(state.auth.session(&token)?))
    }
}

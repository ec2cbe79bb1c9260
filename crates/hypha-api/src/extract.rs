//! Request extractors

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use hypha_store::{bearer_token, verify_jwt, AuthInfo};

/// Caller identity from a verified `Authorization: Bearer` token.
///
/// Rejects with 401 before the handler runs, so no database work happens
/// for anonymous requests.
pub struct Authenticated(pub AuthInfo);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let token = bearer_token(header)
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;
        Ok(Self(verify_jwt(token, &state.auth)?))
    }
}

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// Caller identity as asserted by the authenticating front proxy.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub user_id: i64,
    /// Key of the caller's staged upload.
    pub session_id: String,
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized("Not signed in".into()))?
            .parse::<i64>()
            .map_err(|_| AppError::Unauthorized("Malformed user id".into()))?;

        let session_id = header(parts, SESSION_ID_HEADER)
            .map(str::to_string)
            .unwrap_or_else(|| format!("user-{}", user_id));

        Ok(CurrentUser { user_id, session_id })
    }
}

//! Authentication middleware.
//!
//! Authentication mechanics are the hosting application's concern; this
//! extractor only turns a Bearer token into an authenticated actor the
//! core can reason about. In development mode (no AUTH_SECRET) the token
//! is taken as the user id directly; the configured ADMIN_TOKEN grants
//! administrator privileges for session termination and lock release.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};
use scribe_engine::Actor;

use crate::AppState;

/// Authenticated actor extracted from the request.
#[derive(Debug, Clone)]
pub struct AuthActor(pub Actor);

impl FromRequestParts<AppState> for AuthActor {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        match auth_header {
            Some(header) if header.starts_with("Bearer ") => {
                let token = header.trim_start_matches("Bearer ").to_string();

                if token.is_empty() {
                    return Err((StatusCode::UNAUTHORIZED, "Empty bearer token"));
                }

                if state
                    .config
                    .admin_token
                    .as_deref()
                    .is_some_and(|admin| admin == token)
                {
                    return Ok(AuthActor(Actor::admin("admin")));
                }

                // With AUTH_SECRET configured, the hosting application is
                // expected to mint verifiable tokens; token validation
                // beyond presence is out of scope here. The token carries
                // the user identity either way.
                Ok(AuthActor(Actor::user(token)))
            }
            Some(_) => Err((
                StatusCode::UNAUTHORIZED,
                "Invalid authorization header format",
            )),
            None => {
                // In development mode, allow requests without auth.
                if state.config.auth_secret.is_none() {
                    Ok(AuthActor(Actor::user("anonymous")))
                } else {
                    Err((StatusCode::UNAUTHORIZED, "Missing authorization header"))
                }
            }
        }
    }
}

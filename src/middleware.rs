use axum::extract::{FromRequestParts, Request, State};
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::warn;

use crate::db::get_user;
use crate::error::AppError;
use crate::models::User;
use crate::AppState;

pub const CLIENT_ID_HEADER: &str = "client-id";
pub const CLIENT_SECRET_HEADER: &str = "client-secret";

/// An authenticated request, carrying the resolved user. Missing token, bad
/// token, expired token, and a token for a deleted user all produce the same
/// rejection; the reason only shows up in logs.
pub struct Identity(pub User);

impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            warn!("request without bearer token");
            return Err(AppError::Unauthenticated);
        };

        let user_id = state.tokens.verify(token).map_err(|reason| {
            warn!(%reason, "rejected bearer token");
            AppError::Unauthenticated
        })?;

        match get_user(&state.db, user_id)? {
            Some(user) => Ok(Identity(user)),
            None => {
                warn!(user_id, "token references a user that no longer exists");
                Err(AppError::Unauthenticated)
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Static client id/secret gate for the whole /api surface. Runs before any
/// identity check; a coarse anti-abuse bar, not per-user authorization.
pub async fn require_api_keys(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let headers = request.headers();
    let client_id = headers
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok());
    let client_secret = headers
        .get(CLIENT_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());

    let (Some(client_id), Some(client_secret)) = (client_id, client_secret) else {
        warn!("request without API client credentials");
        return key_rejection("API client id and secret are required");
    };

    if client_id != state.api_keys.client_id || client_secret != state.api_keys.client_secret {
        warn!(client_id, "request with invalid API client credentials");
        return key_rejection("Invalid API client id or secret");
    }

    next.run(request).await
}

fn key_rejection(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "status": "fail", "message": message })),
    )
        .into_response()
}

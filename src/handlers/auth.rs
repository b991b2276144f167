use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::{hash_password, verify_password};
use crate::db::{create_user, find_user_by_email};
use crate::error::AppError;
use crate::middleware::Identity;
use crate::models::{LoginRequest, RegisterRequest, UserProfile};
use crate::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let req = req.cleaned();
    req.validate()?;

    let password_hash = hash_password(&req.password);
    let user = create_user(&state.db, &req.name, &req.email, &password_hash)?;
    let token = state.tokens.issue(user.id)?;
    info!(email = %user.email, "registered new user");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "data": { "user": UserProfile::from(&user), "token": token },
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    req.validate()?;

    // Unknown email and wrong password fall out identically.
    let Some(user) = find_user_by_email(&state.db, &req.email)? else {
        warn!("login attempt for unknown email");
        return Err(AppError::InvalidCredentials);
    };
    if !verify_password(&req.password, &user.password_hash) {
        warn!(email = %user.email, "login attempt with wrong password");
        return Err(AppError::InvalidCredentials);
    }

    let token = state.tokens.issue(user.id)?;
    info!(email = %user.email, "user logged in");

    Ok(Json(json!({
        "status": "success",
        "data": { "user": UserProfile::from(&user), "token": token },
    })))
}

pub async fn me(Identity(user): Identity) -> Json<Value> {
    Json(json!({
        "status": "success",
        "data": { "user": UserProfile::from(&user) },
    }))
}

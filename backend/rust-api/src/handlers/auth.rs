use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    errors::ApiError,
    extractors::AppJson,
    metrics::LOGIN_ATTEMPTS_TOTAL,
    middlewares::auth::{JwtClaims, JwtService},
    models::user::{LoginRequest, RegisterRequest, UserProfile},
    services::{auth_service::AuthService, AppState},
};

/// POST /api/v1/auth/register - Register a new user
pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate request
    if let Err(e) = req.validate() {
        return Err(ApiError::invalid_input(format!("Validation error: {}", e)));
    }

    tracing::info!("Registering new user: {}", req.email);

    let jwt_service = JwtService::new(&state.config.jwt_secret);
    let service = AuthService::new(state.mongo.clone(), state.redis.clone(), jwt_service);

    let response = service.register(req).await?;

    tracing::info!("User registered successfully");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": "User registered successfully",
            "user": response.user,
            "access_token": response.access_token,
        })),
    ))
}

/// POST /api/v1/auth/login - Login with email and password
pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate request
    if let Err(e) = req.validate() {
        return Err(ApiError::invalid_input(format!("Validation error: {}", e)));
    }

    tracing::info!("Login attempt for user: {}", req.email);

    let jwt_service = JwtService::new(&state.config.jwt_secret);
    let service = AuthService::new(state.mongo.clone(), state.redis.clone(), jwt_service);

    // Save email for the lockout counters; login consumes the request
    let email = req.email.clone();

    // Check if account is locked due to failed login attempts
    let is_locked = service.check_failed_attempts(&email).await.unwrap_or(false); // Default to unlocked if Redis check fails

    if is_locked {
        tracing::warn!("Login blocked for {}: too many failed attempts", email);
        LOGIN_ATTEMPTS_TOTAL.with_label_values(&["locked"]).inc();
        return Err(ApiError::too_many_requests(
            "Too many failed login attempts. Please try again later.",
        ));
    }

    match service.login(req).await {
        Ok(response) => {
            // Clear failed login attempts on successful login
            let _ = service.clear_failed_attempts(&email).await;
            LOGIN_ATTEMPTS_TOTAL.with_label_values(&["success"]).inc();

            Ok((
                StatusCode::OK,
                Json(json!({
                    "status": "success",
                    "message": "Logged in successfully",
                    "user": response.user,
                    "access_token": response.access_token,
                })),
            ))
        }
        Err(e @ ApiError::Unauthorized(_)) => {
            // Only bad credentials feed the lockout counter, infra
            // errors must not lock anyone out
            let count = service.increment_failed_attempts(&email).await.unwrap_or(0);
            tracing::warn!("Failed login attempts for {}: {}/5", email, count);
            LOGIN_ATTEMPTS_TOTAL.with_label_values(&["failure"]).inc();
            Err(e)
        }
        Err(e) => Err(e),
    }
}

/// GET /api/v1/auth/me - Get current user profile (protected)
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::debug!("Getting current user profile for user_id: {}", claims.sub);

    let jwt_service = JwtService::new(&state.config.jwt_secret);
    let service = AuthService::new(state.mongo.clone(), state.redis.clone(), jwt_service);

    let user = service.get_user_by_id(&claims.sub).await?;

    Ok(Json(json!({
        "status": "success",
        "user": UserProfile::from(user),
    })))
}

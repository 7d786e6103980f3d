use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    errors::ApiError,
    models::reporting::LeaderboardQuery,
    services::{reporting_service::ReportingService, AppState},
};

/// GET /api/v1/admin/trainees - Roster of all trainees with per-module progress
pub async fn list_trainees(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::debug!("Building trainee progress roster");

    let service = ReportingService::new(state.mongo.clone());
    let trainees = service.list_trainees_with_progress().await?;

    Ok(Json(json!({ "status": "success", "trainees": trainees })))
}

/// GET /api/v1/admin/leaderboard - Trainees ranked by average passing score
pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(10).clamp(1, 100);

    let service = ReportingService::new(state.mongo.clone());
    let leaderboard = service.leaderboard(limit).await?;

    Ok(Json(json!({ "status": "success", "leaderboard": leaderboard })))
}

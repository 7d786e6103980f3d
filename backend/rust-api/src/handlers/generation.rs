use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    errors::ApiError,
    extractors::AppJson,
    models::generation::{ChatRequest, GenerateModuleContentRequest},
    services::{generation_service::GenerationService, AppState},
};

/// POST /api/v1/ai/generate-module-content - Generate a reading document
/// and quiz for a topic (admin only)
pub async fn generate_module_content(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<GenerateModuleContentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate request
    if let Err(e) = req.validate() {
        return Err(ApiError::invalid_input(format!("Validation error: {}", e)));
    }

    tracing::info!("Generating module content for: {}", req.module_title);

    let service = GenerationService::new(state.redis.clone(), &state.config);
    let content = service.generate_module_content(&req.module_title).await?;

    Ok(Json(json!({
        "status": "success",
        "reading_document": content.reading_document,
        "mcq_assignment": content.mcq_assignment,
    })))
}

/// POST /api/v1/ai/chat - Ask the fire safety assistant a question
pub async fn chat(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate request
    if let Err(e) = req.validate() {
        return Err(ApiError::invalid_input(format!("Validation error: {}", e)));
    }

    let service = GenerationService::new(state.redis.clone(), &state.config);
    let response = service.chat(&req.message).await?;

    Ok(Json(json!({ "status": "success", "response": response })))
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use mongodb::bson::oid::ObjectId;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

use crate::{
    errors::ApiError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::{
        module::{AdminModuleRow, CreateModuleRequest, ModuleDetail, TraineeModuleRow},
        progress::{CompleteSectionRequest, ProgressRecord, SubmitAssignmentRequest},
    },
    services::{module_service::ModuleService, progress_service::ProgressService, AppState},
};

/// POST /api/v1/modules - Create a training module (admin only)
pub async fn create_module(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<CreateModuleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate request
    if let Err(e) = req.validate() {
        return Err(ApiError::invalid_input(format!("Validation error: {}", e)));
    }

    tracing::info!("Creating module: {}", req.title);

    let service = ModuleService::new(state.mongo.clone());
    let module = service.create_module(req).await?;

    let module_id = module.id.map(|id| id.to_hex()).unwrap_or_default();

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": "Module created successfully",
            "module_id": module_id,
        })),
    ))
}

/// GET /api/v1/modules - List modules, shaped by the caller's role.
/// Admins get planning metadata; trainees get their own progress.
pub async fn list_modules(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let service = ModuleService::new(state.mongo.clone());
    let modules = service.list_modules().await?;

    if claims.role == "admin" {
        let rows: Vec<AdminModuleRow> = modules
            .into_iter()
            .map(|module| AdminModuleRow {
                id: module.id.map(|id| id.to_hex()).unwrap_or_default(),
                title: module.title,
                reading_time: module.reading_time,
                videos_time: module.videos_time,
                assignment_time: module.assignment_time,
            })
            .collect();

        return Ok(Json(json!({ "status": "success", "modules": rows })));
    }

    let user_id = parse_user_id(&claims)?;
    let progress_service = ProgressService::new(state.mongo.clone());
    let records = progress_service.records_for_user(&user_id).await?;

    let by_module: HashMap<ObjectId, &ProgressRecord> = records
        .iter()
        .map(|record| (record.module_id, record))
        .collect();

    let rows: Vec<TraineeModuleRow> = modules
        .into_iter()
        .map(|module| {
            let record = module.id.and_then(|id| by_module.get(&id));
            TraineeModuleRow {
                id: module.id.map(|id| id.to_hex()).unwrap_or_default(),
                title: module.title,
                progress: record.map(|r| r.percentage()).unwrap_or(0.0),
                completed: record.map(|r| r.assignment_completed).unwrap_or(false),
            }
        })
        .collect();

    Ok(Json(json!({ "status": "success", "modules": rows })))
}

/// GET /api/v1/modules/{id} - Get full module content
pub async fn get_module(
    State(state): State<Arc<AppState>>,
    Path(module_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let module_id = parse_module_id(&module_id)?;

    let service = ModuleService::new(state.mongo.clone());
    let module = service.get_module(&module_id).await?;

    Ok(Json(json!({
        "status": "success",
        "module": ModuleDetail::from(module),
    })))
}

/// GET /api/v1/modules/{id}/progress - Get the caller's progress for a module
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(module_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let module_id = parse_module_id(&module_id)?;
    let user_id = parse_user_id(&claims)?;

    let service = ProgressService::new(state.mongo.clone());
    let progress = service.progress_summary(&module_id, &user_id).await?;

    Ok(Json(json!({ "status": "success", "progress": progress })))
}

/// POST /api/v1/modules/{id}/complete-section - Mark a section as completed
pub async fn complete_section(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(module_id): Path<String>,
    AppJson(req): AppJson<CompleteSectionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let module_id = parse_module_id(&module_id)?;
    let user_id = parse_user_id(&claims)?;

    let service = ProgressService::new(state.mongo.clone());
    let section = service
        .mark_section_complete(&module_id, &user_id, &req.section)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "message": format!("Section {} marked as completed", section.as_str()),
    })))
}

/// POST /api/v1/modules/{id}/submit-assignment - Grade a quiz submission
pub async fn submit_assignment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(module_id): Path<String>,
    AppJson(req): AppJson<SubmitAssignmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let module_id = parse_module_id(&module_id)?;
    let user_id = parse_user_id(&claims)?;

    let service = ProgressService::new(state.mongo.clone());
    let result = service
        .submit_assignment(&module_id, &user_id, &req.answers)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "score": result.score,
        "passed": result.passed,
        "message": "Assignment submitted successfully",
    })))
}

fn parse_module_id(value: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(value).map_err(|_| ApiError::invalid_input("Invalid module ID format"))
}

fn parse_user_id(claims: &JwtClaims) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(&claims.sub).map_err(|_| ApiError::unauthorized("Invalid token"))
}

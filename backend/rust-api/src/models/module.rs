use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::user::bson_datetime_as_chrono;

/// Training module stored in the MongoDB "modules" collection.
///
/// `mcq_assignment` holds the quiz as an opaque JSON string in the
/// `{"quiz": [...]}` shape. It is stored as authored and only parsed
/// at submission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingModule {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    pub reading_document: String,
    pub videos: Vec<String>,
    pub mcq_assignment: String,
    pub reading_time: i32,
    pub videos_time: i32,
    pub assignment_time: i32,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

/// Request to create a module (admin only)
#[derive(Debug, Deserialize, Validate)]
pub struct CreateModuleRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title must be between 1 and 200 characters"
    ))]
    pub title: String,

    #[serde(default)]
    pub reading_document: String,

    #[serde(default)]
    pub videos: Vec<String>,

    #[serde(default)]
    pub mcq_assignment: String,

    #[serde(default = "default_reading_time")]
    pub reading_time: i32,

    #[serde(default = "default_videos_time")]
    pub videos_time: i32,

    #[serde(default = "default_assignment_time")]
    pub assignment_time: i32,
}

fn default_reading_time() -> i32 {
    5
}

fn default_videos_time() -> i32 {
    5
}

fn default_assignment_time() -> i32 {
    10
}

/// Module list entry as seen by admins
#[derive(Debug, Serialize)]
pub struct AdminModuleRow {
    pub id: String,
    pub title: String,
    pub reading_time: i32,
    pub videos_time: i32,
    pub assignment_time: i32,
}

/// Module list entry as seen by trainees, shaped by their own progress
#[derive(Debug, Serialize)]
pub struct TraineeModuleRow {
    pub id: String,
    pub title: String,
    /// Section completion percentage, one of 0, 33.33, 66.67 or 100
    pub progress: f64,
    pub completed: bool,
}

/// Full module payload returned by the detail endpoint
#[derive(Debug, Serialize)]
pub struct ModuleDetail {
    pub id: String,
    pub title: String,
    pub reading_document: String,
    pub videos: Vec<String>,
    pub mcq_assignment: String,
    pub reading_time: i32,
    pub videos_time: i32,
    pub assignment_time: i32,
}

impl From<TrainingModule> for ModuleDetail {
    fn from(module: TrainingModule) -> Self {
        ModuleDetail {
            id: module.id.map(|id| id.to_hex()).unwrap_or_default(),
            title: module.title,
            reading_document: module.reading_document,
            videos: module.videos,
            mcq_assignment: module.mcq_assignment,
            reading_time: module.reading_time,
            videos_time: module.videos_time,
            assignment_time: module.assignment_time,
        }
    }
}

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to synthesize module content from a topic title
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateModuleContentRequest {
    #[serde(rename = "moduleTitle")]
    #[validate(length(
        min = 1,
        max = 200,
        message = "Module title must be between 1 and 200 characters"
    ))]
    pub module_title: String,
}

/// Generated reading document plus the raw quiz text returned by the
/// model. Neither is validated here; the quiz is parsed only when a
/// trainee submits answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedModuleContent {
    pub reading_document: String,
    pub mcq_assignment: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 4000, message = "Message is required"))]
    pub message: String,
}

use anyhow::Context;
use redis::aio::ConnectionManager;
use serde_json::json;

use crate::config::Config;
use crate::errors::ApiError;
use crate::metrics::{record_cache_hit, record_cache_miss, GENERATION_REQUESTS_TOTAL};
use crate::models::generation::GeneratedModuleContent;

const CACHE_TTL: u64 = 3600; // 1 hour
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Adapter for the Gemini-compatible generateContent REST API. Module
/// content is cached in Redis to avoid re-billing identical topics;
/// chat replies are never cached.
pub struct GenerationService {
    redis: ConnectionManager,
    api_key: String,
    base_url: String,
    model: String,
}

impl GenerationService {
    pub fn new(redis: ConnectionManager, config: &Config) -> Self {
        Self {
            redis,
            api_key: config.gemini_api_key.clone(),
            base_url: config.gemini_base_url.clone(),
            model: config.gemini_model.clone(),
        }
    }

    /// Generate a reading document and a 10-question quiz for a topic
    /// title. Both come back as opaque text; the quiz JSON is stored
    /// unvalidated and only parsed at submission time.
    pub async fn generate_module_content(
        &self,
        module_title: &str,
    ) -> Result<GeneratedModuleContent, ApiError> {
        let result = self.generate_module_content_inner(module_title).await;

        let status = if result.is_ok() { "success" } else { "error" };
        GENERATION_REQUESTS_TOTAL
            .with_label_values(&["module_content", status])
            .inc();

        result
    }

    async fn generate_module_content_inner(
        &self,
        module_title: &str,
    ) -> Result<GeneratedModuleContent, ApiError> {
        let cache_key = content_cache_key(module_title);

        if let Ok(cached) = self.get_cached_content(&cache_key).await {
            record_cache_hit();
            tracing::debug!(title = %module_title, "Module content served from cache");
            return Ok(cached);
        }
        record_cache_miss();

        let reading_document = self
            .generate_text(&reading_document_prompt(module_title))
            .await?;
        let mcq_assignment = self
            .generate_text(&mcq_assignment_prompt(module_title))
            .await?;

        let content = GeneratedModuleContent {
            reading_document,
            mcq_assignment,
        };

        self.cache_content(&cache_key, &content).await.ok();

        tracing::info!(title = %module_title, "Module content generated");
        Ok(content)
    }

    /// One-shot fire-safety assistant reply
    pub async fn chat(&self, message: &str) -> Result<String, ApiError> {
        let result = self.generate_text(&chat_prompt(message)).await;

        let status = if result.is_ok() { "success" } else { "error" };
        GENERATION_REQUESTS_TOTAL
            .with_label_values(&["chat", status])
            .inc();

        result
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, ApiError> {
        if self.api_key.is_empty() {
            return Err(ApiError::upstream("Generation backend is not configured"));
        }

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        let body = json!({
            "contents": [
                { "parts": [ { "text": prompt } ] }
            ]
        });

        let response = client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::upstream(format!("Generation request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, error = %error_text, "Generation API error");
            return Err(ApiError::upstream(format!(
                "Generation API returned status {}",
                status
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ApiError::upstream(format!("Invalid generation response: {}", e)))?;

        extract_text(&payload)
            .ok_or_else(|| ApiError::upstream("Generation response contained no text"))
    }

    async fn get_cached_content(&self, cache_key: &str) -> anyhow::Result<GeneratedModuleContent> {
        let mut conn = self.redis.clone();

        let raw: String = redis::cmd("GET")
            .arg(cache_key)
            .query_async(&mut conn)
            .await
            .context("Module content not in cache")?;

        serde_json::from_str(&raw).context("Failed to decode cached module content")
    }

    async fn cache_content(
        &self,
        cache_key: &str,
        content: &GeneratedModuleContent,
    ) -> anyhow::Result<()> {
        let mut conn = self.redis.clone();
        let raw = serde_json::to_string(content).context("Failed to encode module content")?;

        redis::cmd("SETEX")
            .arg(cache_key)
            .arg(CACHE_TTL)
            .arg(&raw)
            .query_async::<()>(&mut conn)
            .await
            .context("Failed to cache module content")?;

        Ok(())
    }
}

/// Cache key for generated module content, normalized so "Fire Safety"
/// and " fire safety " share an entry
fn content_cache_key(module_title: &str) -> String {
    format!(
        "generation:module_content:{}",
        module_title.trim().to_lowercase()
    )
}

/// First text part of the first candidate in a generateContent response
fn extract_text(payload: &serde_json::Value) -> Option<String> {
    payload
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
        .map(|s| s.to_string())
}

fn reading_document_prompt(module_title: &str) -> String {
    format!(
        "Create a comprehensive educational document about {} for fire safety training.\n\
         Include the following sections:\n\
         1. Introduction\n\
         2. Key Learning Objectives\n\
         3. Detailed Explanation of Core Concepts\n\
         4. Practical Applications\n\
         5. Safety Considerations\n\
         6. Summary\n\n\
         Format the content with clear headings and bullet points where appropriate.\n\
         Write in a professional training style suitable for fire safety professionals.",
        module_title
    )
}

fn mcq_assignment_prompt(module_title: &str) -> String {
    format!(
        "Create a multiple-choice quiz with 10 challenging questions about {} for fire safety training.\n\
         Each question should have 4 options with only one correct answer.\n\
         Ensure the questions cover different aspects of the topic and vary in difficulty.\n\n\
         Provide the output in the following JSON format:\n\
         {{\n\
           \"quiz\": [\n\
             {{\n\
               \"question\": \"Question text?\",\n\
               \"options\": [\"Option A\", \"Option B\", \"Option C\", \"Option D\"],\n\
               \"answer\": \"Correct option\"\n\
             }}\n\
           ]\n\
         }}",
        module_title
    )
}

fn chat_prompt(message: &str) -> String {
    format!(
        "You are a fire safety training assistant. Provide clear, concise, and accurate answers to questions about fire safety.\n\
         The user asks: {}\n\n\
         Respond in a professional and helpful manner, focusing on fire safety best practices, regulations, and training information.\n\
         If the question is not related to fire safety, politely inform the user that you specialize in fire safety topics.",
        message
    )
}

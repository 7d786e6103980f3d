use crate::errors::ApiError;
use crate::metrics::MODULES_CREATED_TOTAL;
use crate::models::module::{CreateModuleRequest, TrainingModule};
use anyhow::Context;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;

pub struct ModuleService {
    mongo: Database,
}

impl ModuleService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Create a new training module (admin only)
    pub async fn create_module(
        &self,
        req: CreateModuleRequest,
    ) -> Result<TrainingModule, ApiError> {
        let collection = self.mongo.collection::<TrainingModule>("modules");

        let module = TrainingModule {
            id: None, // MongoDB will generate
            title: req.title,
            reading_document: req.reading_document,
            videos: req.videos,
            mcq_assignment: req.mcq_assignment,
            reading_time: req.reading_time,
            videos_time: req.videos_time,
            assignment_time: req.assignment_time,
            created_at: Utc::now(),
        };

        let insert_result = collection
            .insert_one(&module)
            .await
            .context("Failed to insert module")?;

        let module_id = insert_result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| ApiError::internal("Failed to get inserted module ID"))?;

        MODULES_CREATED_TOTAL.inc();
        tracing::info!(module_id = %module_id.to_hex(), title = %module.title, "Module created");

        let mut module_with_id = module;
        module_with_id.id = Some(module_id);
        Ok(module_with_id)
    }

    /// List the full catalog in creation order (oldest first)
    pub async fn list_modules(&self) -> Result<Vec<TrainingModule>, ApiError> {
        let collection = self.mongo.collection::<TrainingModule>("modules");
        let cursor = collection
            .find(doc! {})
            .sort(doc! { "createdAt": 1 })
            .await
            .context("Failed to query modules")?;

        Ok(cursor.try_collect().await.context("Failed to read modules")?)
    }

    /// Load one module by id
    pub async fn get_module(&self, module_id: &ObjectId) -> Result<TrainingModule, ApiError> {
        let collection = self.mongo.collection::<TrainingModule>("modules");
        collection
            .find_one(doc! { "_id": module_id })
            .await
            .context("Failed to query module")?
            .ok_or_else(|| ApiError::not_found("Module not found"))
    }
}

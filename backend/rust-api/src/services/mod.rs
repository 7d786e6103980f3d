use crate::config::Config;
use anyhow::Context;
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client as MongoClient, Database, IndexModel};
use redis::aio::ConnectionManager;

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
    pub redis: ConnectionManager,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);

        tracing::info!("Attempting to connect to Redis...");

        // Create ConnectionManager with longer timeout
        let redis = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        tracing::info!("Redis ConnectionManager created, testing with PING...");

        // Test connection
        let mut conn = redis.clone();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        Ok(Self {
            config,
            mongo,
            redis,
        })
    }

    /// Create the indexes the API relies on. Safe to run on every
    /// startup; MongoDB treats an existing identical index as a no-op.
    pub async fn ensure_indexes(&self) -> anyhow::Result<()> {
        let users = self.mongo.collection::<mongodb::bson::Document>("users");

        users
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
            )
            .await
            .context("Failed to create unique email index on users")?;

        // Roster queries filter users by role
        users
            .create_index(IndexModel::builder().keys(doc! { "role": 1 }).build())
            .await
            .context("Failed to create role index on users")?;

        // Progress uniqueness is already carried by the composite _id;
        // this index documents the constraint and serves per-user scans.
        let progress = self
            .mongo
            .collection::<mongodb::bson::Document>("progress_records");

        progress
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "module_id": 1, "user_id": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
            )
            .await
            .context("Failed to create module/user index on progress_records")?;

        tracing::info!("MongoDB indexes ensured");
        Ok(())
    }
}

/// True when the error is a MongoDB duplicate-key write error (E11000)
pub(crate) fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    if let mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(ref we)) =
        *err.kind
    {
        we.code == 11000
    } else {
        false
    }
}

pub mod auth_service;
pub mod generation_service;
pub mod module_service;
pub mod progress_service;
pub mod reporting_service;

use std::collections::HashMap;

use anyhow::Context;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::Database;

use crate::errors::ApiError;
use crate::models::module::TrainingModule;
use crate::models::progress::ProgressRecord;
use crate::models::reporting::{LeaderboardEntry, TraineeModuleProgress, TraineeProgressRow};
use crate::models::user::{User, UserRole};

pub struct ReportingService {
    mongo: Database,
}

impl ReportingService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Roster of every trainee with one row per module, in catalog
    /// order. Modules, trainees and progress records are each fetched
    /// once and joined in memory on the composite record id; absent
    /// records read as the zero defaults.
    pub async fn list_trainees_with_progress(&self) -> Result<Vec<TraineeProgressRow>, ApiError> {
        let modules: Vec<TrainingModule> = self
            .mongo
            .collection::<TrainingModule>("modules")
            .find(doc! {})
            .sort(doc! { "createdAt": 1 })
            .await
            .context("Failed to query modules")?
            .try_collect()
            .await
            .context("Failed to read modules")?;

        let trainees: Vec<User> = self
            .mongo
            .collection::<User>("users")
            .find(doc! { "role": UserRole::Trainee.as_str() })
            .await
            .context("Failed to query trainees")?
            .try_collect()
            .await
            .context("Failed to read trainees")?;

        let records: Vec<ProgressRecord> = self
            .mongo
            .collection::<ProgressRecord>("progress_records")
            .find(doc! {})
            .await
            .context("Failed to query progress records")?
            .try_collect()
            .await
            .context("Failed to read progress records")?;

        let records_by_id: HashMap<String, ProgressRecord> = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();

        let mut rows = Vec::with_capacity(trainees.len());
        for trainee in trainees {
            let Some(trainee_id) = trainee.id else {
                continue;
            };

            let module_rows = modules
                .iter()
                .map(|module| {
                    let record = module
                        .id
                        .and_then(|module_id| {
                            records_by_id.get(&ProgressRecord::record_id(&module_id, &trainee_id))
                        });

                    TraineeModuleProgress {
                        module_id: module.id.map(|id| id.to_hex()).unwrap_or_default(),
                        module_title: module.title.clone(),
                        attempts: record.map(|r| r.attempts.clone()).unwrap_or_default(),
                        completed: record.map(|r| r.assignment_completed).unwrap_or(false),
                        last_score: record.map(|r| r.last_score).unwrap_or(0.0),
                    }
                })
                .collect();

            rows.push(TraineeProgressRow {
                id: trainee_id.to_hex(),
                name: trainee.name,
                email: trainee.email,
                modules: module_rows,
            });
        }

        Ok(rows)
    }

    /// Ranked leaderboard over passed progress records: per user the
    /// mean of `last_score` (rounded to 2 decimals) and the count of
    /// passed modules, ordered score desc then count desc. Users with
    /// no passed record never appear.
    pub async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, ApiError> {
        let collection = self
            .mongo
            .collection::<Document>("progress_records");

        let pipeline = vec![
            doc! { "$match": { "passed": true } },
            doc! {
                "$group": {
                    "_id": "$user_id",
                    "score": { "$avg": "$last_score" },
                    "modules_completed": { "$sum": 1 }
                }
            },
            doc! { "$sort": { "score": -1, "modules_completed": -1 } },
            doc! { "$limit": limit },
        ];

        let mut cursor = collection
            .aggregate(pipeline)
            .await
            .context("Failed to run leaderboard aggregation")?;

        let mut ranked = Vec::new();
        let mut user_ids = Vec::new();

        while let Some(doc) = cursor
            .try_next()
            .await
            .context("Leaderboard cursor failure")?
        {
            if let Ok(user_id) = doc.get_object_id("_id") {
                let score = doc
                    .get_f64("score")
                    .or_else(|_| doc.get_i64("score").map(|v| v as f64))
                    .or_else(|_| doc.get_i32("score").map(|v| v as f64))
                    .unwrap_or(0.0);
                let modules_completed = doc
                    .get_i64("modules_completed")
                    .or_else(|_| doc.get_i32("modules_completed").map(|v| v as i64))
                    .unwrap_or(0);
                user_ids.push(user_id);
                ranked.push((user_id, score, modules_completed));
            }
        }

        let names = self.load_user_names(&user_ids).await?;

        Ok(ranked
            .into_iter()
            .map(|(user_id, score, modules_completed)| LeaderboardEntry {
                user_id: user_id.to_hex(),
                name: names
                    .get(&user_id)
                    .cloned()
                    .unwrap_or_else(|| "Unknown".to_string()),
                score: (score * 100.0).round() / 100.0,
                modules_completed,
            })
            .collect())
    }

    async fn load_user_names(
        &self,
        user_ids: &[ObjectId],
    ) -> Result<HashMap<ObjectId, String>, ApiError> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let collection = self.mongo.collection::<Document>("users");
        let mut cursor = collection
            .find(doc! { "_id": { "$in": user_ids.iter().cloned().map(Bson::ObjectId).collect::<Vec<_>>() } })
            .await
            .context("Failed to query users for leaderboard")?;

        let mut names = HashMap::new();
        while let Some(user_doc) = cursor
            .try_next()
            .await
            .context("Failed to read user for leaderboard")?
        {
            if let Ok(user_id) = user_doc.get_object_id("_id") {
                if let Ok(name) = user_doc.get_str("name") {
                    names.insert(user_id, name.to_string());
                }
            }
        }

        Ok(names)
    }
}

use serde::{Deserialize, Serialize};

use super::progress::Attempt;

/// One module row inside a trainee's roster entry. Trainees without a
/// progress record for the module get the zero defaults.
#[derive(Debug, Serialize)]
pub struct TraineeModuleProgress {
    pub module_id: String,
    pub module_title: String,
    pub attempts: Vec<Attempt>,
    pub completed: bool,
    pub last_score: f64,
}

/// Roster entry: one trainee with a row for every module, in catalog
/// order
#[derive(Debug, Serialize)]
pub struct TraineeProgressRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub modules: Vec<TraineeModuleProgress>,
}

/// Ranked leaderboard entry. `score` is the mean of `last_score` over
/// the user's currently passed modules, rounded to 2 decimals.
#[derive(Debug, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub name: String,
    pub score: f64,
    pub modules_completed: i64,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<i64>,
}

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::user::bson_datetime_as_chrono;

/// Per-user progress through a module, stored in the MongoDB
/// "progress_records" collection.
///
/// The `_id` is the composite key `"{module_id}:{user_id}"` (hex), so
/// the store itself guarantees at most one record per pair. Records are
/// created lazily on the first section completion or submission and are
/// never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub module_id: ObjectId,
    pub user_id: ObjectId,
    pub reading_completed: bool,
    pub videos_completed: bool,
    pub assignment_completed: bool,
    /// Score of the most recent attempt, 0 when none were made
    #[serde(default)]
    pub last_score: f64,
    /// Whether the most recent attempt passed
    #[serde(default)]
    pub passed: bool,
    #[serde(default)]
    pub attempts: Vec<Attempt>,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    pub fn record_id(module_id: &ObjectId, user_id: &ObjectId) -> String {
        format!("{}:{}", module_id.to_hex(), user_id.to_hex())
    }

    pub fn completed_sections(&self) -> u32 {
        [
            self.reading_completed,
            self.videos_completed,
            self.assignment_completed,
        ]
        .iter()
        .filter(|&&done| done)
        .count() as u32
    }

    pub fn percentage(&self) -> f64 {
        progress_percentage(self.completed_sections())
    }
}

/// Section completion percentage for 0..=3 completed sections.
pub fn progress_percentage(completed_sections: u32) -> f64 {
    (completed_sections as f64 / 3.0) * 100.0
}

/// One graded assignment submission, embedded in a progress record.
/// History only grows; the record's `last_score`/`passed` mirror the
/// newest entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub timestamp: DateTime<Utc>,
    pub score: f64,
    pub passed: bool,
}

/// The three completable sections of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Reading,
    Videos,
    Assignment,
}

impl Section {
    pub fn parse(value: &str) -> Option<Section> {
        match value {
            "reading" => Some(Section::Reading),
            "videos" => Some(Section::Videos),
            "assignment" => Some(Section::Assignment),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Section::Reading => "reading",
            Section::Videos => "videos",
            Section::Assignment => "assignment",
        }
    }

    /// Name of the completion flag field on the stored record
    pub fn flag_field(&self) -> &str {
        match self {
            Section::Reading => "reading_completed",
            Section::Videos => "videos_completed",
            Section::Assignment => "assignment_completed",
        }
    }
}

/// Parsed shape of a module's stored `mcq_assignment` JSON
#[derive(Debug, Deserialize)]
pub struct Quiz {
    pub quiz: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteSectionRequest {
    pub section: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAssignmentRequest {
    #[serde(default)]
    pub answers: Vec<String>,
}

/// Grading outcome returned after a submission
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SubmissionResult {
    pub score: f64,
    pub passed: bool,
}

/// Read-only view of a user's section flags for one module
#[derive(Debug, Default, Serialize)]
pub struct SectionProgress {
    pub reading: bool,
    pub videos: bool,
    pub assignment: bool,
    pub percentage: f64,
}

impl From<&ProgressRecord> for SectionProgress {
    fn from(record: &ProgressRecord) -> Self {
        SectionProgress {
            reading: record.reading_completed,
            videos: record.videos_completed,
            assignment: record.assignment_completed,
            percentage: record.percentage(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_flags(reading: bool, videos: bool, assignment: bool) -> ProgressRecord {
        ProgressRecord {
            id: "m:u".to_string(),
            module_id: ObjectId::new(),
            user_id: ObjectId::new(),
            reading_completed: reading,
            videos_completed: videos,
            assignment_completed: assignment,
            last_score: 0.0,
            passed: false,
            attempts: vec![],
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn percentage_takes_only_four_values() {
        assert_eq!(progress_percentage(0), 0.0);
        assert!((progress_percentage(1) - 33.333333333333336).abs() < 1e-9);
        assert!((progress_percentage(2) - 66.66666666666667).abs() < 1e-9);
        assert_eq!(progress_percentage(3), 100.0);
    }

    #[test]
    fn completed_sections_counts_each_flag_once() {
        assert_eq!(record_with_flags(false, false, false).completed_sections(), 0);
        assert_eq!(record_with_flags(true, false, false).completed_sections(), 1);
        assert_eq!(record_with_flags(true, false, true).completed_sections(), 2);
        assert_eq!(record_with_flags(true, true, true).completed_sections(), 3);
    }

    #[test]
    fn section_parse_accepts_known_names_only() {
        assert_eq!(Section::parse("reading"), Some(Section::Reading));
        assert_eq!(Section::parse("videos"), Some(Section::Videos));
        assert_eq!(Section::parse("assignment"), Some(Section::Assignment));
        assert_eq!(Section::parse("Reading"), None);
        assert_eq!(Section::parse("quiz"), None);
        assert_eq!(Section::parse(""), None);
    }

    #[test]
    fn record_id_is_module_then_user() {
        let module_id = ObjectId::new();
        let user_id = ObjectId::new();
        let id = ProgressRecord::record_id(&module_id, &user_id);
        assert_eq!(id, format!("{}:{}", module_id.to_hex(), user_id.to_hex()));
    }

    #[test]
    fn section_progress_defaults_to_empty() {
        let progress = SectionProgress::default();
        assert!(!progress.reading);
        assert!(!progress.videos);
        assert!(!progress.assignment);
        assert_eq!(progress.percentage, 0.0);
    }
}

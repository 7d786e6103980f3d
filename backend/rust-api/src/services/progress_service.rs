use crate::errors::ApiError;
use crate::metrics::{ASSIGNMENTS_SUBMITTED_TOTAL, SECTIONS_COMPLETED_TOTAL};
use crate::models::module::TrainingModule;
use crate::models::progress::{
    Attempt, ProgressRecord, Quiz, QuizQuestion, Section, SectionProgress, SubmissionResult,
};
use crate::utils::time::chrono_to_bson;
use anyhow::Context;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, to_bson};
use mongodb::Database;

pub struct ProgressService {
    mongo: Database,
}

impl ProgressService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Mark one section of a module as completed for a user.
    ///
    /// Creates the progress record lazily on first touch. A concurrent
    /// first write loses on the composite `_id` with E11000; at that
    /// point the record provably exists, so the call is re-dispatched
    /// once as the targeted update. Completion flags only ever go
    /// false -> true, so the operation is idempotent.
    pub async fn mark_section_complete(
        &self,
        module_id: &ObjectId,
        user_id: &ObjectId,
        section: &str,
    ) -> Result<Section, ApiError> {
        let section =
            Section::parse(section).ok_or_else(|| ApiError::invalid_input("Invalid section"))?;

        self.ensure_module_exists(module_id).await?;

        let collection = self.mongo.collection::<ProgressRecord>("progress_records");
        let record_id = ProgressRecord::record_id(module_id, user_id);

        let existing = collection
            .find_one(doc! { "_id": &record_id })
            .await
            .context("Failed to query progress record")?;

        if existing.is_some() {
            self.set_section_flag(&record_id, section).await?;
        } else {
            let record = record_with_section(&record_id, module_id, user_id, section);
            match collection.insert_one(&record).await {
                Ok(_) => {}
                Err(err) if super::is_duplicate_key(&err) => {
                    tracing::debug!(
                        record_id = %record_id,
                        "Lost first-write race, updating existing record"
                    );
                    self.set_section_flag(&record_id, section).await?;
                }
                Err(err) => {
                    return Err(anyhow::Error::from(err)
                        .context("Failed to insert progress record")
                        .into());
                }
            }
        }

        SECTIONS_COMPLETED_TOTAL
            .with_label_values(&[section.as_str()])
            .inc();

        tracing::info!(
            module_id = %module_id.to_hex(),
            user_id = %user_id.to_hex(),
            section = section.as_str(),
            "Section marked as completed"
        );

        Ok(section)
    }

    /// Grade a quiz submission and record the attempt.
    ///
    /// The stored `mcq_assignment` is parsed here and nowhere else;
    /// unusable content is a content error, while a failing score is a
    /// normal result. `last_score`/`passed` always mirror this newest
    /// attempt, never the best one.
    pub async fn submit_assignment(
        &self,
        module_id: &ObjectId,
        user_id: &ObjectId,
        answers: &[String],
    ) -> Result<SubmissionResult, ApiError> {
        let module = self.load_module(module_id).await?;
        let quiz = parse_quiz(&module.mcq_assignment)?;

        let result = grade_quiz(&quiz.quiz, answers);
        let attempt = Attempt {
            timestamp: Utc::now(),
            score: result.score,
            passed: result.passed,
        };

        let collection = self.mongo.collection::<ProgressRecord>("progress_records");
        let record_id = ProgressRecord::record_id(module_id, user_id);

        let existing = collection
            .find_one(doc! { "_id": &record_id })
            .await
            .context("Failed to query progress record")?;

        if existing.is_some() {
            self.record_attempt(&record_id, &attempt).await?;
        } else {
            let record = record_with_attempt(&record_id, module_id, user_id, attempt.clone());
            match collection.insert_one(&record).await {
                Ok(_) => {}
                Err(err) if super::is_duplicate_key(&err) => {
                    tracing::debug!(
                        record_id = %record_id,
                        "Lost first-write race, appending attempt to existing record"
                    );
                    self.record_attempt(&record_id, &attempt).await?;
                }
                Err(err) => {
                    return Err(anyhow::Error::from(err)
                        .context("Failed to insert progress record")
                        .into());
                }
            }
        }

        let passed_label = if result.passed { "true" } else { "false" };
        ASSIGNMENTS_SUBMITTED_TOTAL
            .with_label_values(&[passed_label])
            .inc();

        tracing::info!(
            module_id = %module_id.to_hex(),
            user_id = %user_id.to_hex(),
            score = result.score,
            passed = result.passed,
            "Assignment graded"
        );

        Ok(result)
    }

    /// Read-only view of a user's section flags for one module.
    /// An absent record reads as all-false with 0 percent.
    pub async fn progress_summary(
        &self,
        module_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<SectionProgress, ApiError> {
        self.ensure_module_exists(module_id).await?;

        let collection = self.mongo.collection::<ProgressRecord>("progress_records");
        let record_id = ProgressRecord::record_id(module_id, user_id);

        let record = collection
            .find_one(doc! { "_id": &record_id })
            .await
            .context("Failed to query progress record")?;

        Ok(record
            .as_ref()
            .map(SectionProgress::from)
            .unwrap_or_default())
    }

    /// All progress records belonging to one user, used to shape the
    /// trainee module list
    pub async fn records_for_user(
        &self,
        user_id: &ObjectId,
    ) -> Result<Vec<ProgressRecord>, ApiError> {
        let collection = self.mongo.collection::<ProgressRecord>("progress_records");
        let cursor = collection
            .find(doc! { "user_id": user_id })
            .await
            .context("Failed to query progress records")?;

        Ok(cursor
            .try_collect()
            .await
            .context("Failed to read progress records")?)
    }

    async fn set_section_flag(&self, record_id: &str, section: Section) -> Result<(), ApiError> {
        let collection = self.mongo.collection::<ProgressRecord>("progress_records");
        collection
            .update_one(
                doc! { "_id": record_id },
                doc! {
                    "$set": {
                        section.flag_field(): true,
                        "updatedAt": chrono_to_bson(Utc::now())
                    }
                },
            )
            .await
            .context("Failed to update progress record")?;
        Ok(())
    }

    async fn record_attempt(&self, record_id: &str, attempt: &Attempt) -> Result<(), ApiError> {
        let collection = self.mongo.collection::<ProgressRecord>("progress_records");
        collection
            .update_one(
                doc! { "_id": record_id },
                doc! {
                    "$push": { "attempts": to_bson(attempt).context("Failed to encode attempt")? },
                    "$set": {
                        "assignment_completed": true,
                        "last_score": attempt.score,
                        "passed": attempt.passed,
                        "updatedAt": chrono_to_bson(Utc::now())
                    }
                },
            )
            .await
            .context("Failed to record attempt")?;
        Ok(())
    }

    async fn load_module(&self, module_id: &ObjectId) -> Result<TrainingModule, ApiError> {
        let collection = self.mongo.collection::<TrainingModule>("modules");
        collection
            .find_one(doc! { "_id": module_id })
            .await
            .context("Failed to query module")?
            .ok_or_else(|| ApiError::not_found("Module not found"))
    }

    async fn ensure_module_exists(&self, module_id: &ObjectId) -> Result<(), ApiError> {
        self.load_module(module_id).await.map(|_| ())
    }
}

/// Parse a module's stored assignment JSON. The content is opaque until
/// a submission needs it; absent, unparseable, or missing-"quiz" text
/// all read as the same content error.
pub(crate) fn parse_quiz(raw: &str) -> Result<Quiz, ApiError> {
    serde_json::from_str::<Quiz>(raw)
        .map_err(|_| ApiError::content_error("MCQ assignment not available"))
}

/// Grade answers against the quiz. Question `i` is correct iff an
/// answer exists at `i` and matches the stored answer exactly
/// (case-sensitive, whitespace included). Answers beyond the question
/// count are ignored; a zero-question quiz scores 0.
pub(crate) fn grade_quiz(questions: &[QuizQuestion], answers: &[String]) -> SubmissionResult {
    let total = questions.len();
    let correct = questions
        .iter()
        .enumerate()
        .filter(|(i, question)| {
            answers
                .get(*i)
                .map(|answer| answer == &question.answer)
                .unwrap_or(false)
        })
        .count();

    let score = if total > 0 {
        (correct as f64 / total as f64) * 100.0
    } else {
        0.0
    };

    SubmissionResult {
        score,
        passed: score >= 70.0,
    }
}

fn record_with_section(
    record_id: &str,
    module_id: &ObjectId,
    user_id: &ObjectId,
    section: Section,
) -> ProgressRecord {
    ProgressRecord {
        id: record_id.to_string(),
        module_id: *module_id,
        user_id: *user_id,
        reading_completed: section == Section::Reading,
        videos_completed: section == Section::Videos,
        assignment_completed: section == Section::Assignment,
        last_score: 0.0,
        passed: false,
        attempts: vec![],
        updated_at: Utc::now(),
    }
}

fn record_with_attempt(
    record_id: &str,
    module_id: &ObjectId,
    user_id: &ObjectId,
    attempt: Attempt,
) -> ProgressRecord {
    ProgressRecord {
        id: record_id.to_string(),
        module_id: *module_id,
        user_id: *user_id,
        reading_completed: false,
        videos_completed: false,
        assignment_completed: true,
        last_score: attempt.score,
        passed: attempt.passed,
        attempts: vec![attempt],
        updated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(answer: &str) -> QuizQuestion {
        QuizQuestion {
            question: format!("Which option is {}?", answer),
            options: vec![
                "A".to_string(),
                "B".to_string(),
                "C".to_string(),
                "D".to_string(),
            ],
            answer: answer.to_string(),
        }
    }

    fn answers(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn three_of_four_correct_scores_75_and_passes() {
        let questions = vec![question("A"), question("B"), question("C"), question("D")];
        let result = grade_quiz(&questions, &answers(&["A", "X", "C", "D"]));
        assert_eq!(result.score, 75.0);
        assert!(result.passed);
    }

    #[test]
    fn all_correct_scores_100() {
        let questions = vec![question("A"), question("B"), question("C")];
        let result = grade_quiz(&questions, &answers(&["A", "B", "C"]));
        assert_eq!(result.score, 100.0);
        assert!(result.passed);
    }

    #[test]
    fn empty_answers_score_zero_and_fail() {
        let questions = vec![question("A"), question("B")];
        let result = grade_quiz(&questions, &[]);
        assert_eq!(result.score, 0.0);
        assert!(!result.passed);
    }

    #[test]
    fn zero_questions_score_zero_even_with_answers() {
        let result = grade_quiz(&[], &answers(&["A", "B"]));
        assert_eq!(result.score, 0.0);
        assert!(!result.passed);
    }

    #[test]
    fn exactly_seventy_percent_passes() {
        let questions: Vec<QuizQuestion> = (0..10).map(|_| question("A")).collect();
        let seven_right = answers(&["A", "A", "A", "A", "A", "A", "A", "X", "X", "X"]);
        let result = grade_quiz(&questions, &seven_right);
        assert_eq!(result.score, 70.0);
        assert!(result.passed);
    }

    #[test]
    fn just_under_seventy_percent_fails() {
        // 9 of 13 is ~69.23%
        let questions: Vec<QuizQuestion> = (0..13).map(|_| question("A")).collect();
        let mut nine_right = vec!["A".to_string(); 9];
        nine_right.extend(vec!["X".to_string(); 4]);
        let result = grade_quiz(&questions, &nine_right);
        assert!(result.score < 70.0);
        assert!(!result.passed);
    }

    #[test]
    fn short_answer_vector_never_indexes_out_of_range() {
        let questions = vec![question("A"), question("B"), question("C")];
        let result = grade_quiz(&questions, &answers(&["A"]));
        assert!((result.score - 100.0 / 3.0).abs() < 1e-9);
        assert!(!result.passed);
    }

    #[test]
    fn extra_answers_are_ignored() {
        let questions = vec![question("A"), question("B")];
        let result = grade_quiz(&questions, &answers(&["A", "B", "C", "D"]));
        assert_eq!(result.score, 100.0);
        assert!(result.passed);
    }

    #[test]
    fn comparison_is_case_sensitive_and_whitespace_exact() {
        let questions = vec![question("A"), question("B")];
        let result = grade_quiz(&questions, &answers(&["a", "B "]));
        assert_eq!(result.score, 0.0);
        assert!(!result.passed);
    }

    #[test]
    fn parse_quiz_accepts_quiz_shape() {
        let raw = r#"{"quiz":[{"question":"Q?","options":["A","B"],"answer":"A"}]}"#;
        let quiz = parse_quiz(raw).unwrap();
        assert_eq!(quiz.quiz.len(), 1);
        assert_eq!(quiz.quiz[0].answer, "A");
    }

    #[test]
    fn parse_quiz_accepts_empty_question_list() {
        let quiz = parse_quiz(r#"{"quiz":[]}"#).unwrap();
        assert!(quiz.quiz.is_empty());
    }

    #[test]
    fn parse_quiz_rejects_unusable_content() {
        assert!(matches!(parse_quiz(""), Err(ApiError::ContentError(_))));
        assert!(matches!(
            parse_quiz("not json"),
            Err(ApiError::ContentError(_))
        ));
        assert!(matches!(parse_quiz("{}"), Err(ApiError::ContentError(_))));
        assert!(matches!(
            parse_quiz(r#"{"quiz": null}"#),
            Err(ApiError::ContentError(_))
        ));
    }

    #[test]
    fn new_section_record_sets_only_that_flag() {
        let module_id = ObjectId::new();
        let user_id = ObjectId::new();
        let record_id = ProgressRecord::record_id(&module_id, &user_id);

        let record = record_with_section(&record_id, &module_id, &user_id, Section::Videos);
        assert!(!record.reading_completed);
        assert!(record.videos_completed);
        assert!(!record.assignment_completed);
        assert!(record.attempts.is_empty());
        assert_eq!(record.last_score, 0.0);
        assert!(!record.passed);
    }

    #[test]
    fn new_attempt_record_mirrors_the_attempt() {
        let module_id = ObjectId::new();
        let user_id = ObjectId::new();
        let record_id = ProgressRecord::record_id(&module_id, &user_id);
        let attempt = Attempt {
            timestamp: Utc::now(),
            score: 80.0,
            passed: true,
        };

        let record = record_with_attempt(&record_id, &module_id, &user_id, attempt);
        assert!(!record.reading_completed);
        assert!(!record.videos_completed);
        assert!(record.assignment_completed);
        assert_eq!(record.last_score, 80.0);
        assert!(record.passed);
        assert_eq!(record.attempts.len(), 1);
    }
}

use crate::assessment::{Assessment, NewAssessment};
use crate::error::StorageError;
use crate::json_store::JsonFileStore;
use crate::remote_store::RemoteStore;
use crate::rubric::ClassRubric;
use crate::score::{Score, ScoreWrite};
use crate::store::GradeStore;
use log::warn;

/// Remote API first, local JSON files when the API cannot be reached.
///
/// Only [`StorageError::Unavailable`] triggers the fallback; a definite answer
/// from the API (validation failure, 403, ...) is returned as is. Writes that
/// fall back stay in the local files; they are not replayed to the API later.
pub struct TieredStore {
    remote: RemoteStore,
    local: JsonFileStore,
}

impl TieredStore {
    pub fn new(remote: RemoteStore, local: JsonFileStore) -> Self {
        TieredStore { remote, local }
    }

    pub fn local(&self) -> &JsonFileStore {
        &self.local
    }

    fn with_fallback<T>(
        &self,
        operation: &str,
        remote: impl FnOnce(&RemoteStore) -> Result<T, StorageError>,
        local: impl FnOnce(&JsonFileStore) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        match remote(&self.remote) {
            Err(e) if e.is_unavailable() => {
                warn!("{} falling back to local files: {}", operation, e);
                local(&self.local)
            }
            result => result,
        }
    }
}

impl GradeStore for TieredStore {
    fn fetch_rubric(&self, class_id: u64) -> Result<Option<ClassRubric>, StorageError> {
        self.with_fallback(
            "fetch_rubric",
            |s| s.fetch_rubric(class_id),
            |s| s.fetch_rubric(class_id),
        )
    }

    fn store_rubric(&self, class_id: u64, rubric: &ClassRubric) -> Result<(), StorageError> {
        self.with_fallback(
            "store_rubric",
            |s| s.store_rubric(class_id, rubric),
            |s| s.store_rubric(class_id, rubric),
        )
    }

    fn fetch_assessments(&self, class_id: u64) -> Result<Vec<Assessment>, StorageError> {
        self.with_fallback(
            "fetch_assessments",
            |s| s.fetch_assessments(class_id),
            |s| s.fetch_assessments(class_id),
        )
    }

    fn fetch_assessment(&self, assessment_id: u64) -> Result<Option<Assessment>, StorageError> {
        self.with_fallback(
            "fetch_assessment",
            |s| s.fetch_assessment(assessment_id),
            |s| s.fetch_assessment(assessment_id),
        )
    }

    fn insert_assessment(&self, draft: &NewAssessment) -> Result<Assessment, StorageError> {
        self.with_fallback(
            "insert_assessment",
            |s| s.insert_assessment(draft),
            |s| s.insert_assessment(draft),
        )
    }

    fn replace_assessment(&self, assessment: &Assessment) -> Result<(), StorageError> {
        self.with_fallback(
            "replace_assessment",
            |s| s.replace_assessment(assessment),
            |s| s.replace_assessment(assessment),
        )
    }

    fn remove_assessment(&self, assessment_id: u64) -> Result<bool, StorageError> {
        self.with_fallback(
            "remove_assessment",
            |s| s.remove_assessment(assessment_id),
            |s| s.remove_assessment(assessment_id),
        )
    }

    fn fetch_scores(&self, class_id: u64) -> Result<Vec<Score>, StorageError> {
        self.with_fallback(
            "fetch_scores",
            |s| s.fetch_scores(class_id),
            |s| s.fetch_scores(class_id),
        )
    }

    fn fetch_scores_for_assessment(&self, assessment_id: u64) -> Result<Vec<Score>, StorageError> {
        self.with_fallback(
            "fetch_scores_for_assessment",
            |s| s.fetch_scores_for_assessment(assessment_id),
            |s| s.fetch_scores_for_assessment(assessment_id),
        )
    }

    fn fetch_scores_for_student(&self, student_id: &str) -> Result<Vec<Score>, StorageError> {
        self.with_fallback(
            "fetch_scores_for_student",
            |s| s.fetch_scores_for_student(student_id),
            |s| s.fetch_scores_for_student(student_id),
        )
    }

    fn write_score(&self, write: &ScoreWrite) -> Result<Score, StorageError> {
        self.with_fallback("write_score", |s| s.write_score(write), |s| s.write_score(write))
    }

    fn set_scores_published(&self, assessment_id: u64, published: bool) -> Result<usize, StorageError> {
        self.with_fallback(
            "set_scores_published",
            |s| s.set_scores_published(assessment_id, published),
            |s| s.set_scores_published(assessment_id, published),
        )
    }

    fn set_score_published(
        &self,
        assessment_id: u64,
        student_id: &str,
        published: bool,
    ) -> Result<Option<Score>, StorageError> {
        self.with_fallback(
            "set_score_published",
            |s| s.set_score_published(assessment_id, student_id, published),
            |s| s.set_score_published(assessment_id, student_id, published),
        )
    }

    fn remove_score(&self, assessment_id: u64, student_id: &str) -> Result<bool, StorageError> {
        self.with_fallback(
            "remove_score",
            |s| s.remove_score(assessment_id, student_id),
            |s| s.remove_score(assessment_id, student_id),
        )
    }
}

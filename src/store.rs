//! Storage interface shared by the local JSON tier and the remote API tier.
//!
//! Every call runs to completion before returning. Nothing here is
//! transactional: two processes writing the same JSON files race, and the
//! last writer wins.

use crate::assessment::{Assessment, NewAssessment};
use crate::config::{BackendMode, GradebookConfig};
use crate::error::StorageError;
use crate::json_store::JsonFileStore;
use crate::remote_store::RemoteStore;
use crate::rubric::ClassRubric;
use crate::score::{Score, ScoreWrite};
use crate::tiered_store::TieredStore;
use log::info;

pub trait GradeStore {
    /// `Ok(None)` when the class has no rubric yet.
    fn fetch_rubric(&self, class_id: u64) -> Result<Option<ClassRubric>, StorageError>;
    /// Replaces both terms of the class rubric.
    fn store_rubric(&self, class_id: u64, rubric: &ClassRubric) -> Result<(), StorageError>;

    fn fetch_assessments(&self, class_id: u64) -> Result<Vec<Assessment>, StorageError>;
    fn fetch_assessment(&self, assessment_id: u64) -> Result<Option<Assessment>, StorageError>;
    /// Assigns a fresh id and timestamps.
    fn insert_assessment(&self, draft: &NewAssessment) -> Result<Assessment, StorageError>;
    fn replace_assessment(&self, assessment: &Assessment) -> Result<(), StorageError>;
    /// Removes the assessment and every score tied to it.
    fn remove_assessment(&self, assessment_id: u64) -> Result<bool, StorageError>;

    fn fetch_scores(&self, class_id: u64) -> Result<Vec<Score>, StorageError>;
    fn fetch_scores_for_assessment(&self, assessment_id: u64) -> Result<Vec<Score>, StorageError>;
    fn fetch_scores_for_student(&self, student_id: &str) -> Result<Vec<Score>, StorageError>;
    /// Upsert keyed by (student_id, assessment_id).
    fn write_score(&self, write: &ScoreWrite) -> Result<Score, StorageError>;
    /// Sets the flag on every score of the assessment; returns how many changed.
    fn set_scores_published(&self, assessment_id: u64, published: bool) -> Result<usize, StorageError>;
    /// Sets the flag on one score and leaves everything else as stored.
    /// `Ok(None)` when the pair has no score.
    fn set_score_published(
        &self,
        assessment_id: u64,
        student_id: &str,
        published: bool,
    ) -> Result<Option<Score>, StorageError>;
    fn remove_score(&self, assessment_id: u64, student_id: &str) -> Result<bool, StorageError>;
}

/// Opens the storage tiers selected by `config.backend`.
pub fn open_store(config: &GradebookConfig) -> Result<Box<dyn GradeStore>, StorageError> {
    let local = JsonFileStore::open(&config.storage_dir)?;
    match &config.backend {
        BackendMode::LocalOnly => {
            info!("Using local gradebook files in {}", config.storage_dir.display());
            Ok(Box::new(local))
        }
        BackendMode::RemoteWithFallback(remote) => {
            info!(
                "Using remote gradebook API at {} (fallback: {})",
                remote.credentials.url_api,
                config.storage_dir.display()
            );
            Ok(Box::new(TieredStore::new(RemoteStore::new(remote)?, local)))
        }
    }
}

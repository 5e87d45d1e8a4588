use crate::assessment::{Assessment, NewAssessment};
use crate::error::StorageError;
use crate::rubric::ClassRubric;
use crate::score::{Score, ScoreWrite};
use crate::store::GradeStore;
use chrono::Utc;
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const RUBRIC_FILE: &str = "grading_rubrics.json";
pub const ASSESSMENT_FILE: &str = "assessments.json";
pub const SCORE_FILE: &str = "scores.json";

#[derive(Serialize, Deserialize, Debug, Default)]
struct RubricDocument {
    #[serde(default)]
    rubrics: BTreeMap<String, ClassRubric>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct AssessmentDocument {
    #[serde(default)]
    assessments: Vec<Assessment>,
    #[serde(default)]
    last_id: u64,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct ScoreDocument {
    #[serde(default)]
    scores: Vec<Score>,
    #[serde(default)]
    last_id: u64,
}

/// Local tier: one JSON document per entity kind inside a directory.
///
/// Each write reads the whole document, changes it and writes it back through
/// a temporary file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Uses `dir` as is; it is created on the first write.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        JsonFileStore {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Like [`JsonFileStore::new`] but creates the directory up front.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;
        Ok(Self::new(dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    // A missing or empty file reads as an empty document.
    fn read_document<T: DeserializeOwned + Default>(&self, file: &str) -> Result<T, StorageError> {
        let path = self.path(file);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(StorageError::io(path, e)),
        };
        if text.trim().is_empty() {
            return Ok(T::default());
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn write_document<T: Serialize>(&self, file: &str, document: &T) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;
        let path = self.path(file);
        let tmp = self.path(&format!("{}.tmp", file));
        let bytes = serde_json::to_vec_pretty(document)?;
        fs::write(&tmp, bytes).map_err(|e| StorageError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| StorageError::io(&path, e))?;
        debug!("Wrote {}", path.display());
        Ok(())
    }
}

// Next id, robust against a stale `last_id` in hand-edited files.
fn next_id(path: &Path, last_id: u64, existing: impl Iterator<Item = u64>) -> Result<u64, StorageError> {
    existing.fold(last_id, u64::max).checked_add(1).ok_or_else(|| {
        StorageError::io(
            path,
            std::io::Error::new(ErrorKind::InvalidData, "id counter exhausted"),
        )
    })
}

impl GradeStore for JsonFileStore {
    fn fetch_rubric(&self, class_id: u64) -> Result<Option<ClassRubric>, StorageError> {
        let mut document: RubricDocument = self.read_document(RUBRIC_FILE)?;
        Ok(document.rubrics.remove(&class_id.to_string()))
    }

    fn store_rubric(&self, class_id: u64, rubric: &ClassRubric) -> Result<(), StorageError> {
        let mut document: RubricDocument = self.read_document(RUBRIC_FILE)?;
        document.rubrics.insert(class_id.to_string(), rubric.clone());
        self.write_document(RUBRIC_FILE, &document)
    }

    fn fetch_assessments(&self, class_id: u64) -> Result<Vec<Assessment>, StorageError> {
        let document: AssessmentDocument = self.read_document(ASSESSMENT_FILE)?;
        Ok(document
            .assessments
            .into_iter()
            .filter(|a| a.class_id == class_id)
            .collect())
    }

    fn fetch_assessment(&self, assessment_id: u64) -> Result<Option<Assessment>, StorageError> {
        let document: AssessmentDocument = self.read_document(ASSESSMENT_FILE)?;
        Ok(document
            .assessments
            .into_iter()
            .find(|a| a.id == assessment_id))
    }

    fn insert_assessment(&self, draft: &NewAssessment) -> Result<Assessment, StorageError> {
        let mut document: AssessmentDocument = self.read_document(ASSESSMENT_FILE)?;
        let id = next_id(
            &self.path(ASSESSMENT_FILE),
            document.last_id,
            document.assessments.iter().map(|a| a.id),
        )?;
        let assessment = draft.clone().into_assessment(id, Utc::now());
        document.assessments.push(assessment.clone());
        document.last_id = id;
        self.write_document(ASSESSMENT_FILE, &document)?;
        Ok(assessment)
    }

    fn replace_assessment(&self, assessment: &Assessment) -> Result<(), StorageError> {
        let mut document: AssessmentDocument = self.read_document(ASSESSMENT_FILE)?;
        match document.assessments.iter_mut().find(|a| a.id == assessment.id) {
            Some(slot) => *slot = assessment.clone(),
            None => {
                return Err(StorageError::io(
                    self.path(ASSESSMENT_FILE),
                    std::io::Error::new(
                        ErrorKind::NotFound,
                        format!("assessment {} is not stored", assessment.id),
                    ),
                ))
            }
        }
        self.write_document(ASSESSMENT_FILE, &document)
    }

    fn remove_assessment(&self, assessment_id: u64) -> Result<bool, StorageError> {
        let mut document: AssessmentDocument = self.read_document(ASSESSMENT_FILE)?;
        let before = document.assessments.len();
        document.assessments.retain(|a| a.id != assessment_id);
        if document.assessments.len() == before {
            return Ok(false);
        }
        self.write_document(ASSESSMENT_FILE, &document)?;

        let mut scores: ScoreDocument = self.read_document(SCORE_FILE)?;
        let before = scores.scores.len();
        scores.scores.retain(|s| s.assessment_id != assessment_id);
        if scores.scores.len() != before {
            self.write_document(SCORE_FILE, &scores)?;
        }
        Ok(true)
    }

    fn fetch_scores(&self, class_id: u64) -> Result<Vec<Score>, StorageError> {
        let document: ScoreDocument = self.read_document(SCORE_FILE)?;
        Ok(document
            .scores
            .into_iter()
            .filter(|s| s.class_id == class_id)
            .collect())
    }

    fn fetch_scores_for_assessment(&self, assessment_id: u64) -> Result<Vec<Score>, StorageError> {
        let document: ScoreDocument = self.read_document(SCORE_FILE)?;
        Ok(document
            .scores
            .into_iter()
            .filter(|s| s.assessment_id == assessment_id)
            .collect())
    }

    fn fetch_scores_for_student(&self, student_id: &str) -> Result<Vec<Score>, StorageError> {
        let document: ScoreDocument = self.read_document(SCORE_FILE)?;
        Ok(document
            .scores
            .into_iter()
            .filter(|s| s.student_id == student_id)
            .collect())
    }

    fn write_score(&self, write: &ScoreWrite) -> Result<Score, StorageError> {
        let mut document: ScoreDocument = self.read_document(SCORE_FILE)?;
        let now = Utc::now();
        let existing = document
            .scores
            .iter()
            .position(|s| s.student_id == write.student_id && s.assessment_id == write.assessment_id);

        let score = match existing {
            Some(index) => {
                let score = &mut document.scores[index];
                write.apply_to(score, now);
                score.clone()
            }
            None => {
                let id = next_id(
                    &self.path(SCORE_FILE),
                    document.last_id,
                    document.scores.iter().map(|s| s.id),
                )?;
                let score = write.clone().into_score(id, now);
                document.scores.push(score.clone());
                document.last_id = id;
                score
            }
        };
        self.write_document(SCORE_FILE, &document)?;
        Ok(score)
    }

    fn set_scores_published(&self, assessment_id: u64, published: bool) -> Result<usize, StorageError> {
        let mut document: ScoreDocument = self.read_document(SCORE_FILE)?;
        let now = Utc::now();
        let mut changed = 0;
        for score in document
            .scores
            .iter_mut()
            .filter(|s| s.assessment_id == assessment_id && s.is_published != published)
        {
            score.is_published = published;
            score.updated_at = now;
            changed += 1;
        }
        if changed > 0 {
            self.write_document(SCORE_FILE, &document)?;
        }
        Ok(changed)
    }

    fn set_score_published(
        &self,
        assessment_id: u64,
        student_id: &str,
        published: bool,
    ) -> Result<Option<Score>, StorageError> {
        let mut document: ScoreDocument = self.read_document(SCORE_FILE)?;
        let score = match document
            .scores
            .iter_mut()
            .find(|s| s.assessment_id == assessment_id && s.student_id == student_id)
        {
            Some(score) => score,
            None => return Ok(None),
        };
        if score.is_published == published {
            return Ok(Some(score.clone()));
        }
        score.is_published = published;
        score.updated_at = Utc::now();
        let updated = score.clone();
        self.write_document(SCORE_FILE, &document)?;
        Ok(Some(updated))
    }

    fn remove_score(&self, assessment_id: u64, student_id: &str) -> Result<bool, StorageError> {
        let mut document: ScoreDocument = self.read_document(SCORE_FILE)?;
        let before = document.scores.len();
        document
            .scores
            .retain(|s| !(s.assessment_id == assessment_id && s.student_id == student_id));
        if document.scores.len() == before {
            return Ok(false);
        }
        self.write_document(SCORE_FILE, &document)?;
        Ok(true)
    }
}

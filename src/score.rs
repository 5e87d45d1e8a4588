use crate::assessment::AssessmentCatalog;
use crate::error::{GradebookError, Result};
use crate::store::GradeStore;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// Legacy score text such as "32/40" or "8.5 / 10".
static SCORE_FRACTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*/\s*(\d+(?:\.\d+)?)\s*$").unwrap());

/// Parses a legacy `"score/max"` value. Anything malformed, or a non-positive
/// maximum, yields `None` so the caller can skip the value.
pub fn parse_score_fraction(raw: &str) -> Option<(f64, f64)> {
    let captures = SCORE_FRACTION.captures(raw)?;
    let points: f64 = captures[1].parse().ok()?;
    let max_points: f64 = captures[2].parse().ok()?;
    if max_points > 0.0 {
        Some((points, max_points))
    } else {
        None
    }
}

/// Points a student earned on one assessment.
///
/// At most one score exists per (student, assessment) pair. `is_published`
/// separates drafts (faculty only) from grades the student may see.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Score {
    pub id: u64,
    pub class_id: u64,
    pub student_id: String,
    pub assessment_id: u64,
    #[serde(default)]
    pub points: Option<f64>,
    #[serde(default)]
    pub max_points: f64, // copied from the assessment at write time
    #[serde(default)]
    pub is_published: bool,
    /// Legacy `"score/max"` text, read when `points` is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Score {
    /// Earned and maximum points usable for aggregation, or `None` when the
    /// score is empty or unreadable.
    pub fn earned(&self) -> Option<(f64, f64)> {
        match self.points {
            Some(points) if points.is_finite() && self.max_points > 0.0 => {
                Some((points, self.max_points))
            }
            Some(_) => None,
            None => self.value.as_deref().and_then(parse_score_fraction),
        }
    }

    pub fn is_draft(&self) -> bool {
        !self.is_published
    }
}

/// What a storage tier is asked to upsert, keyed by (student_id, assessment_id).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScoreWrite {
    pub class_id: u64,
    pub student_id: String,
    pub assessment_id: u64,
    pub points: Option<f64>,
    pub max_points: f64,
    pub is_published: bool,
}

impl ScoreWrite {
    /// Fresh record for a pair that has no score yet.
    pub fn into_score(self, id: u64, now: DateTime<Utc>) -> Score {
        Score {
            id,
            class_id: self.class_id,
            student_id: self.student_id,
            assessment_id: self.assessment_id,
            points: self.points,
            max_points: self.max_points,
            is_published: self.is_published,
            value: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Updates an existing record in place, keeping its id and creation time.
    pub fn apply_to(&self, score: &mut Score, now: DateTime<Utc>) {
        score.class_id = self.class_id;
        score.points = self.points;
        score.max_points = self.max_points;
        score.is_published = self.is_published;
        score.value = None;
        score.updated_at = now;
    }
}

/// One row of a bulk grading sheet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScoreEntry {
    pub student_id: String,
    pub points: Option<f64>,
    #[serde(default)]
    pub max_points: Option<f64>, // overrides the assessment's max points
}

impl ScoreEntry {
    pub fn new(student_id: &str, points: f64) -> Self {
        ScoreEntry {
            student_id: student_id.to_string(),
            points: Some(points),
            max_points: None,
        }
    }
}

/// Outcome of a best-effort bulk upsert: written scores stay written even when
/// other entries fail.
#[derive(Debug, Default)]
pub struct BulkUpsertReport {
    pub written: Vec<Score>,
    pub failed: Vec<(String, GradebookError)>,
}

impl BulkUpsertReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct MatrixCell {
    pub points: Option<f64>,
    pub max_points: f64,
    pub is_published: bool,
}

/// `student_id → assessment_id → cell`, for tabular display.
pub type ScoreMatrix = BTreeMap<String, BTreeMap<u64, MatrixCell>>;

/// Upsert, publish and query student scores.
pub struct ScoreLedger<'a> {
    store: &'a dyn GradeStore,
}

impl<'a> ScoreLedger<'a> {
    pub fn new(store: &'a dyn GradeStore) -> Self {
        ScoreLedger { store }
    }

    /// Records `points` for the pair, updating the existing score if there is one.
    ///
    /// `max_points` is copied from the assessment. `points: None` records an
    /// empty value that aggregation skips.
    pub fn upsert(
        &self,
        student_id: &str,
        assessment_id: u64,
        points: Option<f64>,
        is_draft: bool,
    ) -> Result<Score> {
        let assessment = AssessmentCatalog::new(self.store).require(assessment_id)?;
        self.write(
            assessment.class_id,
            student_id,
            assessment_id,
            points,
            assessment.max_points,
            is_draft,
        )
    }

    fn write(
        &self,
        class_id: u64,
        student_id: &str,
        assessment_id: u64,
        points: Option<f64>,
        max_points: f64,
        is_draft: bool,
    ) -> Result<Score> {
        let student_id = student_id.trim();
        if student_id.is_empty() {
            return Err(GradebookError::validation("student_id is required"));
        }
        if !(max_points.is_finite() && max_points > 0.0) {
            return Err(GradebookError::validation(format!(
                "max_points must be a positive number, got {}",
                max_points
            )));
        }
        if let Some(points) = points {
            if !points.is_finite() || points < 0.0 {
                return Err(GradebookError::validation(format!(
                    "points must be a non-negative number, got {}",
                    points
                )));
            }
            if points > max_points {
                return Err(GradebookError::validation(format!(
                    "points {} exceed max points {} on assessment {}",
                    points, max_points, assessment_id
                )));
            }
        }

        let score = self.store.write_score(&ScoreWrite {
            class_id,
            student_id: student_id.to_string(),
            assessment_id,
            points,
            max_points,
            is_published: !is_draft,
        })?;
        debug!(
            "Recorded score {} for student {} on assessment {} ({})",
            score.id,
            score.student_id,
            assessment_id,
            if score.is_published { "published" } else { "draft" }
        );
        Ok(score)
    }

    /// Applies [`ScoreLedger::upsert`] per entry without rolling back on failure.
    ///
    /// Fails as a whole only when the assessment is missing or belongs to another class.
    pub fn bulk_upsert(
        &self,
        class_id: u64,
        assessment_id: u64,
        entries: &[ScoreEntry],
        is_draft: bool,
    ) -> Result<BulkUpsertReport> {
        let assessment = AssessmentCatalog::new(self.store).require(assessment_id)?;
        if assessment.class_id != class_id {
            return Err(GradebookError::validation(format!(
                "assessment {} belongs to class {}, not {}",
                assessment_id, assessment.class_id, class_id
            )));
        }

        let mut report = BulkUpsertReport::default();
        for entry in entries {
            let max_points = entry.max_points.unwrap_or(assessment.max_points);
            match self.write(
                class_id,
                &entry.student_id,
                assessment_id,
                entry.points,
                max_points,
                is_draft,
            ) {
                Ok(score) => report.written.push(score),
                Err(e) => {
                    warn!("Skipping score for student '{}': {}", entry.student_id, e);
                    report.failed.push((entry.student_id.clone(), e));
                }
            }
        }
        info!(
            "Bulk upsert on assessment {}: {} written, {} failed",
            assessment_id,
            report.written.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Makes every score of the assessment visible; returns how many changed.
    pub fn publish_all_for_assessment(&self, assessment_id: u64) -> Result<usize> {
        let changed = self.store.set_scores_published(assessment_id, true)?;
        info!("Published {} scores of assessment {}", changed, assessment_id);
        Ok(changed)
    }

    /// Turns every score of the assessment back into a draft; returns how many changed.
    pub fn unpublish_all_for_assessment(&self, assessment_id: u64) -> Result<usize> {
        let changed = self.store.set_scores_published(assessment_id, false)?;
        info!("Unpublished {} scores of assessment {}", changed, assessment_id);
        Ok(changed)
    }

    /// Flips the visibility of a single score. Points, max points and legacy
    /// values are left exactly as stored.
    pub fn set_published(&self, student_id: &str, assessment_id: u64, published: bool) -> Result<Score> {
        let score = self
            .store
            .set_score_published(assessment_id, student_id, published)?
            .ok_or_else(|| GradebookError::not_found("score", format!("{}/{}", student_id, assessment_id)))?;
        debug!(
            "Score {} of student {} on assessment {} is now {}",
            score.id,
            student_id,
            assessment_id,
            if score.is_published { "published" } else { "draft" }
        );
        Ok(score)
    }

    pub fn get(&self, student_id: &str, assessment_id: u64) -> Result<Option<Score>> {
        Ok(self
            .store
            .fetch_scores_for_assessment(assessment_id)?
            .into_iter()
            .find(|score| score.student_id == student_id))
    }

    /// Faculty view: every score of the student in the class, drafts included.
    pub fn scores_for_student(&self, class_id: u64, student_id: &str) -> Result<Vec<Score>> {
        let mut scores = self.store.fetch_scores(class_id)?;
        scores.retain(|score| score.student_id == student_id);
        scores.sort_by_key(|score| score.assessment_id);
        Ok(scores)
    }

    /// Student view: published scores only. Drafts never leave this call, whatever
    /// the backend returns.
    pub fn get_published_scores(&self, student_id: &str) -> Result<Vec<Score>> {
        let mut scores = self.store.fetch_scores_for_student(student_id)?;
        scores.retain(|score| score.is_published && score.student_id == student_id);
        scores.sort_by_key(|score| (score.class_id, score.assessment_id));
        Ok(scores)
    }

    pub fn get_matrix(&self, class_id: u64) -> Result<ScoreMatrix> {
        let mut matrix = ScoreMatrix::new();
        for score in self.store.fetch_scores(class_id)? {
            let (points, max_points) = match score.earned() {
                Some((points, max_points)) => (Some(points), max_points),
                None => (None, score.max_points),
            };
            matrix.entry(score.student_id.clone()).or_default().insert(
                score.assessment_id,
                MatrixCell {
                    points,
                    max_points,
                    is_published: score.is_published,
                },
            );
        }
        Ok(matrix)
    }

    pub fn delete(&self, student_id: &str, assessment_id: u64) -> Result<bool> {
        Ok(self.store.remove_score(assessment_id, student_id)?)
    }
}

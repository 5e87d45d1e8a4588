// Import necessary crates and modules
use crate::error::{GradebookError, Result};
use crate::period::{normalize_component_name, AcademicPeriod};
use crate::store::GradeStore;
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_MAX_POINTS: f64 = 100.0;

fn default_max_points() -> f64 {
    DEFAULT_MAX_POINTS
}

/// A single gradable item (quiz, performance task, exam) of a class.
///
/// The link to the rubric is loose: `rubric_component_name` is free text that is
/// matched case-insensitively against the component names of the term rubric for
/// `academic_period`. An empty name means the assessment is unlinked and never
/// counts towards a grade.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Assessment {
    pub id: u64,
    pub class_id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rubric_component_name: String,
    #[serde(default)]
    pub rubric_component_id: Option<u64>,
    pub academic_period: AcademicPeriod,
    #[serde(default = "default_max_points")]
    pub max_points: f64,
    #[serde(default)]
    pub topic_id: Option<u64>,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Assessment {
    pub fn is_linked(&self) -> bool {
        !self.component_key().is_empty()
    }

    /// Lowercased, trimmed component name used for grouping and matching.
    pub fn component_key(&self) -> String {
        normalize_component_name(&self.rubric_component_name)
    }

    /// True when this assessment feeds the named component of the given term.
    pub fn counts_towards(&self, component_name: &str, period: AcademicPeriod) -> bool {
        self.academic_period == period
            && self.is_linked()
            && self.component_key() == normalize_component_name(component_name)
    }
}

/// Fields supplied by faculty when creating an assessment.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewAssessment {
    pub class_id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rubric_component_name: String,
    #[serde(default)]
    pub rubric_component_id: Option<u64>,
    pub academic_period: AcademicPeriod,
    #[serde(default = "default_max_points")]
    pub max_points: f64,
    #[serde(default)]
    pub topic_id: Option<u64>,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl NewAssessment {
    pub fn new(
        class_id: u64,
        title: &str,
        rubric_component_name: &str,
        academic_period: AcademicPeriod,
    ) -> Self {
        NewAssessment {
            class_id,
            title: title.to_string(),
            description: None,
            rubric_component_name: rubric_component_name.to_string(),
            rubric_component_id: None,
            academic_period,
            max_points: DEFAULT_MAX_POINTS,
            topic_id: None,
            due_at: None,
            is_published: false,
            created_by: None,
        }
    }

    pub fn with_max_points(mut self, max_points: f64) -> Self {
        self.max_points = max_points;
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_component_id(mut self, component_id: u64) -> Self {
        self.rubric_component_id = Some(component_id);
        self
    }

    pub fn with_topic(mut self, topic_id: u64) -> Self {
        self.topic_id = Some(topic_id);
        self
    }

    pub fn with_due_at(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self
    }

    pub fn created_by(mut self, faculty_id: &str) -> Self {
        self.created_by = Some(faculty_id.to_string());
        self
    }

    pub fn published(mut self) -> Self {
        self.is_published = true;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.class_id == 0 {
            return Err(GradebookError::validation("class_id is required"));
        }
        if self.title.trim().is_empty() {
            return Err(GradebookError::validation("title is required"));
        }
        check_max_points(self.max_points)
    }

    /// Materializes the record once the store has picked an id.
    pub fn into_assessment(self, id: u64, now: DateTime<Utc>) -> Assessment {
        Assessment {
            id,
            class_id: self.class_id,
            title: self.title.trim().to_string(),
            description: self.description,
            rubric_component_name: self.rubric_component_name.trim().to_string(),
            rubric_component_id: self.rubric_component_id,
            academic_period: self.academic_period,
            max_points: self.max_points,
            topic_id: self.topic_id,
            due_at: self.due_at,
            is_published: self.is_published,
            created_by: self.created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Patch applied by [`AssessmentCatalog::update`]. `class_id` and `created_by`
/// are absent: they cannot change after creation.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AssessmentUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub rubric_component_name: Option<String>,
    pub rubric_component_id: Option<u64>,
    pub academic_period: Option<AcademicPeriod>,
    pub max_points: Option<f64>,
    pub topic_id: Option<u64>,
    pub due_at: Option<DateTime<Utc>>,
}

impl AssessmentUpdate {
    fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(GradebookError::validation("title is required"));
            }
        }
        match self.max_points {
            Some(max_points) => check_max_points(max_points),
            None => Ok(()),
        }
    }

    fn apply(self, assessment: &mut Assessment) {
        if let Some(title) = self.title {
            assessment.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            assessment.description = Some(description);
        }
        if let Some(name) = self.rubric_component_name {
            assessment.rubric_component_name = name.trim().to_string();
        }
        if let Some(component_id) = self.rubric_component_id {
            assessment.rubric_component_id = Some(component_id);
        }
        if let Some(period) = self.academic_period {
            assessment.academic_period = period;
        }
        if let Some(max_points) = self.max_points {
            assessment.max_points = max_points;
        }
        if let Some(topic_id) = self.topic_id {
            assessment.topic_id = Some(topic_id);
        }
        if let Some(due_at) = self.due_at {
            assessment.due_at = Some(due_at);
        }
        assessment.updated_at = Utc::now();
    }
}

fn check_max_points(max_points: f64) -> Result<()> {
    if max_points.is_finite() && max_points > 0.0 {
        Ok(())
    } else {
        Err(GradebookError::validation(format!(
            "max_points must be a positive number, got {}",
            max_points
        )))
    }
}

/// Per-class list of gradable items.
pub struct AssessmentCatalog<'a> {
    store: &'a dyn GradeStore,
}

impl<'a> AssessmentCatalog<'a> {
    pub fn new(store: &'a dyn GradeStore) -> Self {
        AssessmentCatalog { store }
    }

    /// Creates an assessment. Nothing is written when validation fails.
    pub fn create(&self, draft: NewAssessment) -> Result<Assessment> {
        draft.validate()?;
        let assessment = self.store.insert_assessment(&draft)?;
        info!(
            "Created assessment {} '{}' for class {} ({} / '{}')",
            assessment.id,
            assessment.title,
            assessment.class_id,
            assessment.academic_period,
            assessment.rubric_component_name
        );
        Ok(assessment)
    }

    pub fn get(&self, assessment_id: u64) -> Result<Option<Assessment>> {
        Ok(self.store.fetch_assessment(assessment_id)?)
    }

    pub(crate) fn require(&self, assessment_id: u64) -> Result<Assessment> {
        self.get(assessment_id)?
            .ok_or_else(|| GradebookError::not_found("assessment", assessment_id))
    }

    /// All assessments of a class ordered by id.
    pub fn list_by_class(&self, class_id: u64) -> Result<Vec<Assessment>> {
        let mut assessments = self.store.fetch_assessments(class_id)?;
        assessments.retain(|a| a.class_id == class_id);
        assessments.sort_by_key(|a| a.id);
        Ok(assessments)
    }

    pub fn list_by_period(&self, class_id: u64, period: AcademicPeriod) -> Result<Vec<Assessment>> {
        let mut assessments = self.list_by_class(class_id)?;
        assessments.retain(|a| a.academic_period == period);
        Ok(assessments)
    }

    /// Linked assessments of one period keyed by normalized component name.
    /// Unlinked assessments are left out.
    pub fn list_grouped_by_component(
        &self,
        class_id: u64,
        period: AcademicPeriod,
    ) -> Result<BTreeMap<String, Vec<Assessment>>> {
        let mut groups: BTreeMap<String, Vec<Assessment>> = BTreeMap::new();
        for assessment in self.list_by_period(class_id, period)? {
            if assessment.is_linked() {
                groups
                    .entry(assessment.component_key())
                    .or_default()
                    .push(assessment);
            }
        }
        Ok(groups)
    }

    pub fn publish(&self, assessment_id: u64) -> Result<Assessment> {
        self.set_published(assessment_id, true)
    }

    pub fn unpublish(&self, assessment_id: u64) -> Result<Assessment> {
        self.set_published(assessment_id, false)
    }

    // Only the visibility flag changes; scores are left alone.
    fn set_published(&self, assessment_id: u64, published: bool) -> Result<Assessment> {
        let mut assessment = self.require(assessment_id)?;
        if assessment.is_published != published {
            assessment.is_published = published;
            assessment.updated_at = Utc::now();
            self.store.replace_assessment(&assessment)?;
        }
        Ok(assessment)
    }

    /// Applies a patch. Scores already recorded keep the max points they were written with.
    pub fn update(&self, assessment_id: u64, patch: AssessmentUpdate) -> Result<Assessment> {
        patch.validate()?;
        let mut assessment = self.require(assessment_id)?;
        patch.apply(&mut assessment);
        self.store.replace_assessment(&assessment)?;
        Ok(assessment)
    }

    /// Removes the assessment together with its scores.
    pub fn delete(&self, assessment_id: u64) -> Result<bool> {
        let removed = self.store.remove_assessment(assessment_id)?;
        if removed {
            info!("Deleted assessment {}", assessment_id);
        }
        Ok(removed)
    }
}

//! Two-level weighted grade aggregation.
//!
//! component average → term weighted total → final grade:
//!
//! - component average = Σ earned / Σ max × 100 over the student's usable
//!   scores on assessments linked to that component and term, or 0 when there
//!   are none;
//! - term weighted total = Σ average × component percentage / 100;
//! - final grade = Σ term weighted total × term percentage / 100.
//!
//! A component without scores still carries its full percentage, so an
//! ungraded component pulls the grade down.

use crate::assessment::{Assessment, AssessmentCatalog};
use crate::config::GradebookConfig;
use crate::error::Result;
use crate::period::AcademicPeriod;
use crate::rubric::{ClassRubric, RubricStore, TermRubric};
use crate::score::Score;
use crate::store::GradeStore;
use crate::student::Student;
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;

/// Which scores feed the computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoreVisibility {
    /// Faculty view: drafts included.
    #[default]
    All,
    /// Student view: published scores only.
    PublishedOnly,
}

impl ScoreVisibility {
    fn admits(&self, score: &Score) -> bool {
        match self {
            ScoreVisibility::All => true,
            ScoreVisibility::PublishedOnly => score.is_published,
        }
    }
}

/// Half-up rounding to 2 decimals, as grades are displayed.
///
/// The `1e-9` nudge keeps values such as 87.855, stored as 87.85499999999999,
/// rounding up the way they read.
pub fn round_off_2_decimals(x: f64) -> f64 {
    ((100.0 * x) + 0.5 + 1e-9).floor() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentBreakdown {
    pub component_id: u64,
    pub name: String,
    pub percentage: f64,
    pub earned_points: f64,
    pub max_points: f64,
    pub scored_count: usize,
    pub average: f64,  // 0–100
    pub weighted: f64, // average × percentage / 100
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermBreakdown {
    pub period: AcademicPeriod,
    pub term_percentage: f64,
    pub components: Vec<ComponentBreakdown>,
    pub weighted_total: f64,
    pub contribution: f64, // weighted_total × term_percentage / 100
}

impl TermBreakdown {
    pub fn component(&self, name: &str) -> Option<&ComponentBreakdown> {
        let key = name.trim().to_lowercase();
        self.components
            .iter()
            .find(|c| c.name.trim().to_lowercase() == key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeBreakdown {
    pub class_id: u64,
    pub student_id: String,
    pub midterm: TermBreakdown,
    #[serde(rename = "final")]
    pub final_term: TermBreakdown,
    pub final_grade: f64,
    /// Linked assessments whose component name appears nowhere in the rubric of
    /// their term. They never count, which usually means a typo.
    pub unmatched_assessments: Vec<u64>,
}

impl GradeBreakdown {
    pub fn term(&self, period: AcademicPeriod) -> &TermBreakdown {
        match period {
            AcademicPeriod::Midterm => &self.midterm,
            AcademicPeriod::Final => &self.final_term,
        }
    }

    pub fn rounded_final(&self) -> f64 {
        round_off_2_decimals(self.final_grade)
    }
}

/// Computes the grade of one student from already loaded data.
///
/// `assessments` and `scores` may cover the whole class; only scores of
/// `student_id` on assessments of `class_id` are used. Empty or unparseable
/// scores are skipped rather than counted as zero.
pub fn compute_grade(
    class_id: u64,
    rubric: &ClassRubric,
    assessments: &[Assessment],
    scores: &[Score],
    student_id: &str,
    visibility: ScoreVisibility,
) -> GradeBreakdown {
    let assessments: Vec<&Assessment> = assessments
        .iter()
        .filter(|a| a.class_id == class_id)
        .collect();

    // Latest score per assessment; a well-formed ledger has at most one.
    let mut student_scores: HashMap<u64, &Score> = HashMap::new();
    for score in scores
        .iter()
        .filter(|s| s.student_id == student_id && visibility.admits(s))
    {
        student_scores
            .entry(score.assessment_id)
            .and_modify(|kept| {
                if score.updated_at > kept.updated_at {
                    *kept = score;
                }
            })
            .or_insert(score);
    }

    let midterm = term_breakdown(
        AcademicPeriod::Midterm,
        &rubric.midterm,
        &assessments,
        &student_scores,
    );
    let final_term = term_breakdown(
        AcademicPeriod::Final,
        &rubric.final_term,
        &assessments,
        &student_scores,
    );

    let unmatched_assessments: Vec<u64> = assessments
        .iter()
        .filter(|a| {
            a.is_linked()
                && rubric
                    .term(a.academic_period)
                    .find_component(&a.rubric_component_name)
                    .is_none()
        })
        .map(|a| a.id)
        .collect();

    let final_grade = midterm.contribution + final_term.contribution;
    debug!(
        "Grade for student {} in class {}: {:.4} (midterm {:.4}, final {:.4})",
        student_id, class_id, final_grade, midterm.contribution, final_term.contribution
    );

    GradeBreakdown {
        class_id,
        student_id: student_id.to_string(),
        midterm,
        final_term,
        final_grade,
        unmatched_assessments,
    }
}

fn term_breakdown(
    period: AcademicPeriod,
    term: &TermRubric,
    assessments: &[&Assessment],
    student_scores: &HashMap<u64, &Score>,
) -> TermBreakdown {
    let components: Vec<ComponentBreakdown> = term
        .components
        .iter()
        .map(|component| {
            let mut earned_points = 0.0;
            let mut max_points = 0.0;
            let mut scored_count = 0;

            for assessment in assessments
                .iter()
                .filter(|a| a.counts_towards(&component.name, period))
            {
                let earned = student_scores
                    .get(&assessment.id)
                    .and_then(|score| score.earned());
                if let Some((points, max)) = earned {
                    earned_points += points;
                    max_points += max;
                    scored_count += 1;
                }
            }

            let average = if max_points > 0.0 {
                earned_points / max_points * 100.0
            } else {
                0.0
            };
            ComponentBreakdown {
                component_id: component.id,
                name: component.name.clone(),
                percentage: component.percentage,
                earned_points,
                max_points,
                scored_count,
                average,
                weighted: average * component.percentage / 100.0,
            }
        })
        .collect();

    let weighted_total: f64 = components.iter().map(|c| c.weighted).sum();
    TermBreakdown {
        period,
        term_percentage: term.term_percentage,
        contribution: weighted_total * term.term_percentage / 100.0,
        weighted_total,
        components,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentGrade {
    pub student: Student,
    pub breakdown: GradeBreakdown,
}

/// Store-backed entry point: loads rubric, assessments and scores of a class
/// and runs [`compute_grade`].
pub struct GradeEngine<'a> {
    store: &'a dyn GradeStore,
    config: &'a GradebookConfig,
}

impl<'a> GradeEngine<'a> {
    pub fn new(store: &'a dyn GradeStore, config: &'a GradebookConfig) -> Self {
        GradeEngine { store, config }
    }

    fn load(&self, class_id: u64) -> Result<(ClassRubric, Vec<Assessment>, Vec<Score>)> {
        let rubric = RubricStore::new(self.store, self.config).get_or_default(class_id)?;
        let assessments = AssessmentCatalog::new(self.store).list_by_class(class_id)?;
        let scores = self.store.fetch_scores(class_id)?;
        Ok((rubric, assessments, scores))
    }

    /// Faculty view of a student's grade, drafts included.
    pub fn student_grade(&self, class_id: u64, student_id: &str) -> Result<GradeBreakdown> {
        self.grade_with(class_id, student_id, ScoreVisibility::All)
    }

    /// The grade as the student may see it: published scores only.
    pub fn student_view_grade(&self, class_id: u64, student_id: &str) -> Result<GradeBreakdown> {
        self.grade_with(class_id, student_id, ScoreVisibility::PublishedOnly)
    }

    pub fn grade_with(
        &self,
        class_id: u64,
        student_id: &str,
        visibility: ScoreVisibility,
    ) -> Result<GradeBreakdown> {
        let (rubric, assessments, scores) = self.load(class_id)?;
        Ok(compute_grade(
            class_id,
            &rubric,
            &assessments,
            &scores,
            student_id,
            visibility,
        ))
    }

    /// Faculty grade sheet for a roster, in roster order.
    pub fn class_report(&self, class_id: u64, roster: &[Student]) -> Result<Vec<StudentGrade>> {
        let (rubric, assessments, scores) = self.load(class_id)?;
        let report: Vec<StudentGrade> = roster
            .iter()
            .map(|student| StudentGrade {
                student: student.clone(),
                breakdown: compute_grade(
                    class_id,
                    &rubric,
                    &assessments,
                    &scores,
                    &student.id,
                    ScoreVisibility::All,
                ),
            })
            .collect();

        if let Some(first) = report.first() {
            if !first.breakdown.unmatched_assessments.is_empty() {
                warn!(
                    "Class {}: assessments {:?} name a component missing from the rubric and never count",
                    class_id, first.breakdown.unmatched_assessments
                );
            }
        }
        Ok(report)
    }
}

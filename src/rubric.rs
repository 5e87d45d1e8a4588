use crate::config::GradebookConfig;
use crate::error::{GradebookError, Result};
use crate::period::{normalize_component_name, AcademicPeriod};
use crate::store::GradeStore;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Tolerance used when checking that percentages add up to 100.
pub const PERCENTAGE_EPSILON: f64 = 0.01;

/// How a rubric whose component percentages do not add up to 100 is treated on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RubricValidation {
    /// Log a warning and save anyway.
    #[default]
    Lenient,
    /// Reject with [`GradebookError::InconsistentRubric`].
    Strict,
}

/// A named grading category inside a term rubric (e.g. "Quiz" at 30%).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Component {
    #[serde(default)]
    pub id: u64, // 0 until the rubric is saved
    pub name: String,
    pub percentage: f64,
}

impl Component {
    pub fn new(name: &str, percentage: f64) -> Self {
        Component {
            id: 0,
            name: name.to_string(),
            percentage,
        }
    }

    /// Case-insensitive comparison against a free-text component name.
    pub fn matches_name(&self, name: &str) -> bool {
        normalize_component_name(&self.name) == normalize_component_name(name)
    }
}

/// Weighting for one academic period of a class.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TermRubric {
    pub term_percentage: f64,
    #[serde(default)]
    pub components: Vec<Component>,
}

impl TermRubric {
    pub fn new(term_percentage: f64) -> Self {
        TermRubric {
            term_percentage,
            components: Vec::new(),
        }
    }

    /// Appends a component, giving it the next free id within this term.
    pub fn with_component(mut self, name: &str, percentage: f64) -> Self {
        let mut component = Component::new(name, percentage);
        component.id = self.next_component_id();
        self.components.push(component);
        self
    }

    pub fn component_total(&self) -> f64 {
        self.components.iter().map(|c| c.percentage).sum()
    }

    pub fn find_component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.matches_name(name))
    }

    fn next_component_id(&self) -> u64 {
        self.components.iter().map(|c| c.id).max().unwrap_or(0) + 1
    }

    fn assign_missing_ids(&mut self) {
        let mut next = self.next_component_id();
        let mut seen = HashSet::new();
        for component in self.components.iter_mut() {
            if component.id == 0 || !seen.insert(component.id) {
                component.id = next;
                seen.insert(next);
                next += 1;
            }
        }
    }

    fn check(&self, period: AcademicPeriod, policy: RubricValidation) -> Result<()> {
        if !(0.0..=100.0).contains(&self.term_percentage) {
            return Err(GradebookError::validation(format!(
                "{} term percentage must be between 0 and 100, got {}",
                period, self.term_percentage
            )));
        }

        let mut names = HashSet::new();
        for component in &self.components {
            let key = normalize_component_name(&component.name);
            if key.is_empty() {
                return Err(GradebookError::validation(format!(
                    "{} rubric has a component without a name",
                    period
                )));
            }
            if !(0.0..=100.0).contains(&component.percentage) {
                return Err(GradebookError::validation(format!(
                    "{} component '{}' percentage must be between 0 and 100, got {}",
                    period, component.name, component.percentage
                )));
            }
            if !names.insert(key) {
                return Err(GradebookError::validation(format!(
                    "{} rubric lists component '{}' more than once",
                    period, component.name
                )));
            }
        }

        let total = self.component_total();
        if (total - 100.0).abs() > PERCENTAGE_EPSILON {
            let message = format!(
                "{} component percentages sum to {:.2}, expected 100",
                period, total
            );
            match policy {
                RubricValidation::Lenient => warn!("{}; saving anyway", message),
                RubricValidation::Strict => return Err(GradebookError::InconsistentRubric(message)),
            }
        }
        Ok(())
    }
}

/// Midterm and final weighting of one class, saved and replaced as a unit.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClassRubric {
    pub midterm: TermRubric,
    #[serde(rename = "final")]
    pub final_term: TermRubric,
}

impl ClassRubric {
    pub fn new(midterm: TermRubric, final_term: TermRubric) -> Self {
        ClassRubric {
            midterm,
            final_term,
        }
    }

    /// Term split without any components; used when a class has no rubric yet.
    pub fn default_split(midterm_percentage: f64, final_percentage: f64) -> Self {
        ClassRubric::new(
            TermRubric::new(midterm_percentage),
            TermRubric::new(final_percentage),
        )
    }

    pub fn term(&self, period: AcademicPeriod) -> &TermRubric {
        match period {
            AcademicPeriod::Midterm => &self.midterm,
            AcademicPeriod::Final => &self.final_term,
        }
    }

    /// Checks both terms without saving anything.
    ///
    /// Structural problems (out-of-range percentages, blank or duplicate names) are
    /// always errors. Component totals and a midterm/final split other than 100
    /// follow `policy`.
    pub fn validate(&self, policy: RubricValidation) -> Result<()> {
        self.midterm.check(AcademicPeriod::Midterm, policy)?;
        self.final_term.check(AcademicPeriod::Final, policy)?;

        let split = self.midterm.term_percentage + self.final_term.term_percentage;
        if (split - 100.0).abs() > PERCENTAGE_EPSILON {
            let message = format!(
                "midterm and final term percentages sum to {:.2}, expected 100",
                split
            );
            match policy {
                RubricValidation::Lenient => warn!("{}; saving anyway", message),
                RubricValidation::Strict => return Err(GradebookError::InconsistentRubric(message)),
            }
        }
        Ok(())
    }

    fn assign_missing_ids(&mut self) {
        self.midterm.assign_missing_ids();
        self.final_term.assign_missing_ids();
    }
}

/// Read and replace the grading rubric of a class.
pub struct RubricStore<'a> {
    store: &'a dyn GradeStore,
    config: &'a GradebookConfig,
}

impl<'a> RubricStore<'a> {
    pub fn new(store: &'a dyn GradeStore, config: &'a GradebookConfig) -> Self {
        RubricStore { store, config }
    }

    /// Returns `Ok(None)` when the class has no rubric configured yet.
    pub fn get(&self, class_id: u64) -> Result<Option<ClassRubric>> {
        Ok(self.store.fetch_rubric(class_id)?)
    }

    pub fn get_term(&self, class_id: u64, period: AcademicPeriod) -> Result<Option<TermRubric>> {
        Ok(self.get(class_id)?.map(|rubric| rubric.term(period).clone()))
    }

    /// Like [`RubricStore::get`], but substitutes the configured default term split.
    pub fn get_or_default(&self, class_id: u64) -> Result<ClassRubric> {
        Ok(self.get(class_id)?.unwrap_or_else(|| self.config.default_rubric()))
    }

    /// Replaces both terms of the class rubric using the configured validation policy.
    ///
    /// Returns the rubric as saved, with component ids filled in.
    pub fn set(&self, class_id: u64, rubric: &ClassRubric) -> Result<ClassRubric> {
        self.set_with_policy(class_id, rubric, self.config.rubric_validation)
    }

    pub fn set_with_policy(
        &self,
        class_id: u64,
        rubric: &ClassRubric,
        policy: RubricValidation,
    ) -> Result<ClassRubric> {
        if class_id == 0 {
            return Err(GradebookError::validation("class_id is required"));
        }
        let mut prepared = rubric.clone();
        prepared.assign_missing_ids();
        prepared.validate(policy)?;

        self.store.store_rubric(class_id, &prepared)?;
        info!(
            "Saved grading rubric for class {} ({} midterm / {} final components)",
            class_id,
            prepared.midterm.components.len(),
            prepared.final_term.components.len()
        );
        Ok(prepared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_store::JsonFileStore;
    use tempfile::TempDir;

    fn sample_rubric() -> ClassRubric {
        ClassRubric::new(
            TermRubric::new(33.0)
                .with_component("Quiz", 30.0)
                .with_component("Exam", 70.0),
            TermRubric::new(67.0)
                .with_component("Quiz", 50.0)
                .with_component("Exam", 50.0),
        )
    }

    #[test]
    fn test_with_component_assigns_unique_ids() {
        let term = TermRubric::new(50.0)
            .with_component("Quiz", 40.0)
            .with_component("Exam", 60.0);
        assert_eq!(term.components[0].id, 1);
        assert_eq!(term.components[1].id, 2);
    }

    #[test]
    fn test_find_component_ignores_case() {
        let rubric = sample_rubric();
        assert!(rubric.midterm.find_component("QUIZ").is_some());
        assert!(rubric.midterm.find_component(" quiz ").is_some());
        assert!(rubric.midterm.find_component("project").is_none());
    }

    #[test]
    fn test_lenient_accepts_bad_total() {
        let rubric = ClassRubric::new(
            TermRubric::new(50.0).with_component("Quiz", 40.0),
            TermRubric::new(50.0).with_component("Quiz", 100.0),
        );
        assert!(rubric.validate(RubricValidation::Lenient).is_ok());
    }

    #[test]
    fn test_strict_rejects_bad_total() {
        let rubric = ClassRubric::new(
            TermRubric::new(50.0).with_component("Quiz", 40.0),
            TermRubric::new(50.0).with_component("Quiz", 100.0),
        );
        match rubric.validate(RubricValidation::Strict) {
            Err(GradebookError::InconsistentRubric(message)) => assert!(message.contains("midterm")),
            other => panic!("expected inconsistent rubric, got {:?}", other),
        }
    }

    #[test]
    fn test_total_within_epsilon_passes_strict() {
        let rubric = ClassRubric::new(
            TermRubric::new(50.0)
                .with_component("Quiz", 33.333)
                .with_component("Exam", 66.67),
            TermRubric::new(50.0).with_component("Exam", 100.0),
        );
        assert!(rubric.validate(RubricValidation::Strict).is_ok());
    }

    #[test]
    fn test_term_split_follows_policy() {
        let rubric = ClassRubric::new(
            TermRubric::new(100.0).with_component("Exam", 100.0),
            TermRubric::new(100.0).with_component("Exam", 100.0),
        );
        assert!(rubric.validate(RubricValidation::Lenient).is_ok());
        match rubric.validate(RubricValidation::Strict) {
            Err(GradebookError::InconsistentRubric(message)) => assert!(message.contains("200.00")),
            other => panic!("expected inconsistent rubric, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_names_rejected_even_when_lenient() {
        let rubric = ClassRubric::new(
            TermRubric::new(50.0)
                .with_component("Quiz", 50.0)
                .with_component("quiz", 50.0),
            TermRubric::new(50.0).with_component("Exam", 100.0),
        );
        assert!(matches!(
            rubric.validate(RubricValidation::Lenient),
            Err(GradebookError::Validation(_))
        ));
    }

    #[test]
    fn test_term_percentage_out_of_range() {
        let rubric = ClassRubric::new(
            TermRubric::new(120.0).with_component("Exam", 100.0),
            TermRubric::new(0.0).with_component("Exam", 100.0),
        );
        assert!(matches!(
            rubric.validate(RubricValidation::Lenient),
            Err(GradebookError::Validation(_))
        ));
    }

    #[test]
    fn test_set_and_get_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        let config = GradebookConfig::local(dir.path());
        let rubrics = RubricStore::new(&store, &config);

        let mut rubric = sample_rubric();
        rubric.midterm.components[0].id = 0;
        let saved = rubrics.set(7, &rubric).unwrap();
        assert!(saved.midterm.components.iter().all(|c| c.id != 0));

        let loaded = rubrics.get(7).unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.midterm.components[0].name, "Quiz");
        assert_eq!(loaded.final_term.term_percentage, 67.0);
    }

    #[test]
    fn test_missing_rubric_uses_default_split() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        let config = GradebookConfig::local(dir.path());
        let rubrics = RubricStore::new(&store, &config);

        assert!(rubrics.get(3).unwrap().is_none());
        let fallback = rubrics.get_or_default(3).unwrap();
        assert_eq!(fallback.midterm.term_percentage, 33.0);
        assert_eq!(fallback.final_term.term_percentage, 67.0);
        assert!(fallback.midterm.components.is_empty());
    }

    #[test]
    fn test_strict_set_leaves_existing_rubric_untouched() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        let config = GradebookConfig::local(dir.path());
        let rubrics = RubricStore::new(&store, &config);

        let original = rubrics.set(9, &sample_rubric()).unwrap();
        let broken = ClassRubric::new(
            TermRubric::new(50.0).with_component("Quiz", 10.0),
            TermRubric::new(50.0).with_component("Quiz", 10.0),
        );
        assert!(rubrics
            .set_with_policy(9, &broken, RubricValidation::Strict)
            .is_err());
        assert_eq!(rubrics.get(9).unwrap(), Some(original));
    }
}

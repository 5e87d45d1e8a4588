use classroom_gradebook::{
    AcademicPeriod, ClassRubric, Gradebook, GradebookConfig, GradebookError, RubricValidation,
    TermRubric,
};
use tempfile::TempDir;

fn rubric() -> ClassRubric {
    ClassRubric::new(
        TermRubric::new(40.0)
            .with_component("Quiz", 25.0)
            .with_component("Laboratory", 25.0)
            .with_component("Exam", 50.0),
        TermRubric::new(60.0)
            .with_component("Project", 40.0)
            .with_component("Exam", 60.0),
    )
}

#[test]
fn saved_rubric_reads_back_unchanged() {
    let dir = TempDir::new().unwrap();
    let gradebook = Gradebook::open(GradebookConfig::local(dir.path())).unwrap();

    let saved = gradebook.rubrics().set(12, &rubric()).unwrap();
    assert_eq!(gradebook.rubrics().get(12).unwrap(), Some(saved.clone()));

    let reopened = Gradebook::open(GradebookConfig::local(dir.path())).unwrap();
    assert_eq!(reopened.rubrics().get(12).unwrap(), Some(saved));
    assert_eq!(reopened.rubrics().get(13).unwrap(), None);
}

#[test]
fn set_replaces_both_terms() {
    let dir = TempDir::new().unwrap();
    let gradebook = Gradebook::open(GradebookConfig::local(dir.path())).unwrap();
    gradebook.rubrics().set(12, &rubric()).unwrap();

    let replacement = ClassRubric::new(
        TermRubric::new(50.0).with_component("Recitation", 100.0),
        TermRubric::new(50.0).with_component("Exam", 100.0),
    );
    gradebook.rubrics().set(12, &replacement).unwrap();

    let midterm = gradebook
        .rubrics()
        .get_term(12, AcademicPeriod::Midterm)
        .unwrap()
        .unwrap();
    assert_eq!(midterm.components.len(), 1);
    assert_eq!(midterm.components[0].name, "Recitation");
    assert_eq!(midterm.term_percentage, 50.0);
}

#[test]
fn strict_config_rejects_components_not_summing_to_100() {
    let dir = TempDir::new().unwrap();
    let config = GradebookConfig::local(dir.path()).with_rubric_validation(RubricValidation::Strict);
    let gradebook = Gradebook::open(config).unwrap();

    let lopsided = ClassRubric::new(
        TermRubric::new(33.0)
            .with_component("Quiz", 30.0)
            .with_component("Exam", 60.0),
        TermRubric::new(67.0).with_component("Exam", 100.0),
    );
    assert!(matches!(
        gradebook.rubrics().set(3, &lopsided),
        Err(GradebookError::InconsistentRubric(_))
    ));
    assert_eq!(gradebook.rubrics().get(3).unwrap(), None);

    // The same rubric is accepted, with a warning, under the lenient policy.
    assert!(gradebook
        .rubrics()
        .set_with_policy(3, &lopsided, RubricValidation::Lenient)
        .is_ok());
}

#[test]
fn duplicate_component_names_are_always_rejected() {
    let dir = TempDir::new().unwrap();
    let gradebook = Gradebook::open(GradebookConfig::local(dir.path())).unwrap();

    let duplicated = ClassRubric::new(
        TermRubric::new(33.0)
            .with_component("Quiz", 50.0)
            .with_component("quiz ", 50.0),
        TermRubric::new(67.0).with_component("Exam", 100.0),
    );
    assert!(matches!(
        gradebook.rubrics().set(3, &duplicated),
        Err(GradebookError::Validation(_))
    ));
}

#[test]
fn missing_rubric_defaults_to_configured_split() {
    let dir = TempDir::new().unwrap();
    let config = GradebookConfig::local(dir.path()).with_default_split(40.0, 60.0);
    let gradebook = Gradebook::open(config).unwrap();

    let fallback = gradebook.rubrics().get_or_default(99).unwrap();
    assert_eq!(fallback.midterm.term_percentage, 40.0);
    assert_eq!(fallback.final_term.term_percentage, 60.0);
    assert!(fallback.midterm.components.is_empty());
}

#[test]
fn strict_config_rejects_term_split_not_summing_to_100() {
    let dir = TempDir::new().unwrap();
    let config = GradebookConfig::local(dir.path()).with_rubric_validation(RubricValidation::Strict);
    let gradebook = Gradebook::open(config).unwrap();

    let doubled = ClassRubric::new(
        TermRubric::new(100.0).with_component("Exam", 100.0),
        TermRubric::new(100.0).with_component("Exam", 100.0),
    );
    assert!(matches!(
        gradebook.rubrics().set(4, &doubled),
        Err(GradebookError::InconsistentRubric(_))
    ));
    assert_eq!(gradebook.rubrics().get(4).unwrap(), None);

    let within_tolerance = ClassRubric::new(
        TermRubric::new(33.333).with_component("Exam", 100.0),
        TermRubric::new(66.67).with_component("Exam", 100.0),
    );
    assert!(gradebook.rubrics().set(4, &within_tolerance).is_ok());
}

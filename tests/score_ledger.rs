use classroom_gradebook::{
    AcademicPeriod, AssessmentUpdate, Gradebook, GradebookConfig, GradebookError, NewAssessment,
    ScoreEntry,
};
use tempfile::TempDir;

fn setup() -> (TempDir, Gradebook, u64) {
    let dir = TempDir::new().unwrap();
    let gradebook = Gradebook::open(GradebookConfig::local(dir.path())).unwrap();
    let assessment = gradebook
        .assessments()
        .create(NewAssessment::new(7, "Seatwork 1", "Seatwork", AcademicPeriod::Midterm).with_max_points(20.0))
        .unwrap();
    (dir, gradebook, assessment.id)
}

#[test]
fn repeated_upsert_keeps_a_single_score() {
    let (_dir, gradebook, assessment_id) = setup();
    let scores = gradebook.scores();

    scores.upsert("5", assessment_id, Some(10.0), false).unwrap();
    scores.upsert("5", assessment_id, Some(15.0), false).unwrap();

    let stored = scores.scores_for_student(7, "5").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].points, Some(15.0));
}

#[test]
fn upsert_with_same_values_is_idempotent() {
    let (_dir, gradebook, assessment_id) = setup();
    let scores = gradebook.scores();

    let first = scores.upsert("s1", assessment_id, Some(18.0), true).unwrap();
    let second = scores.upsert("s1", assessment_id, Some(18.0), true).unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(first.points, second.points);
    assert_eq!(first.is_published, second.is_published);
    assert_eq!(scores.get_matrix(7).unwrap()["s1"].len(), 1);
}

#[test]
fn drafts_stay_hidden_until_published() {
    let (_dir, gradebook, assessment_id) = setup();
    let scores = gradebook.scores();

    scores.upsert("s1", assessment_id, Some(18.0), true).unwrap();
    assert!(scores.get_published_scores("s1").unwrap().is_empty());

    assert_eq!(scores.publish_all_for_assessment(assessment_id).unwrap(), 1);
    let visible = scores.get_published_scores("s1").unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].points, Some(18.0));
}

#[test]
fn publish_then_unpublish_restores_previous_state() {
    let (_dir, gradebook, assessment_id) = setup();
    let scores = gradebook.scores();

    scores.upsert("s1", assessment_id, Some(12.0), true).unwrap();
    scores.upsert("s2", assessment_id, Some(14.0), true).unwrap();
    let before = scores.get_matrix(7).unwrap();

    scores.publish_all_for_assessment(assessment_id).unwrap();
    scores.unpublish_all_for_assessment(assessment_id).unwrap();

    assert_eq!(scores.get_matrix(7).unwrap(), before);
}

#[test]
fn bulk_upsert_reports_partial_failures() {
    let (_dir, gradebook, assessment_id) = setup();
    let entries = vec![
        ScoreEntry::new("s1", 19.0),
        ScoreEntry::new("s2", -3.0),
        ScoreEntry::new("s3", 11.0),
    ];

    let report = gradebook
        .scores()
        .bulk_upsert(7, assessment_id, &entries, false)
        .unwrap();
    assert_eq!(report.written.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "s2");
    assert!(matches!(report.failed[0].1, GradebookError::Validation(_)));

    let matrix = gradebook.scores().get_matrix(7).unwrap();
    assert!(matrix.contains_key("s1"));
    assert!(matrix.contains_key("s3"));
    assert!(!matrix.contains_key("s2"));
}

#[test]
fn deleting_an_assessment_removes_its_scores() {
    let (_dir, gradebook, assessment_id) = setup();
    gradebook.scores().upsert("s1", assessment_id, Some(10.0), false).unwrap();

    assert!(gradebook.assessments().delete(assessment_id).unwrap());
    assert!(gradebook.scores().get_matrix(7).unwrap().is_empty());
    assert!(matches!(
        gradebook.scores().upsert("s1", assessment_id, Some(10.0), false),
        Err(GradebookError::NotFound { .. })
    ));
}

#[test]
fn assessment_updates_are_persisted() {
    let (dir, gradebook, assessment_id) = setup();
    gradebook
        .assessments()
        .update(
            assessment_id,
            AssessmentUpdate {
                title: Some("Seatwork 1 (revised)".to_string()),
                max_points: Some(25.0),
                ..Default::default()
            },
        )
        .unwrap();
    drop(gradebook);

    let reopened = Gradebook::open(GradebookConfig::local(dir.path())).unwrap();
    let assessment = reopened.assessments().get(assessment_id).unwrap().unwrap();
    assert_eq!(assessment.title, "Seatwork 1 (revised)");
    assert_eq!(assessment.max_points, 25.0);
    assert_eq!(assessment.class_id, 7);
}

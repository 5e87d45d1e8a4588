//! # Classroom Gradebook
//!
//! This library computes student grades from a class's grading rubric, its
//! assessments and the scores recorded for them. It keeps that data in JSON
//! files or, optionally, behind a school REST API with a local fallback.
//!
//! ## Core Features
//!
//! - **Rubric Configuration:** Per class, a midterm and a final term weight, each split into
//!   named components (quizzes, exams, ...) whose percentages should sum to 100.
//! - **Assessment Catalog:** Gradable items tagged with a rubric component name, an academic
//!   period and their maximum points.
//! - **Score Ledger:** One score per (student, assessment), with a draft/published flag that
//!   decides what the student may see.
//! - **Aggregation:** component average → term weighted total → final grade.
//!
//! ## Usage
//!
//! ```no_run
//! use classroom_gradebook::{
//!     AcademicPeriod, ClassRubric, Gradebook, GradebookConfig, NewAssessment, TermRubric,
//! };
//!
//! # fn main() -> Result<(), classroom_gradebook::GradebookError> {
//! let gradebook = Gradebook::open(GradebookConfig::local("/tmp/gradebook"))?;
//!
//! gradebook.rubrics().set(
//!     1,
//!     &ClassRubric::new(
//!         TermRubric::new(33.0).with_component("Quiz", 30.0).with_component("Exam", 70.0),
//!         TermRubric::new(67.0).with_component("Quiz", 50.0).with_component("Exam", 50.0),
//!     ),
//! )?;
//!
//! let quiz = gradebook.assessments().create(
//!     NewAssessment::new(1, "Quiz 1", "Quiz", AcademicPeriod::Midterm).with_max_points(40.0),
//! )?;
//! gradebook.scores().upsert("2021-00123", quiz.id, Some(32.0), false)?;
//!
//! let grade = gradebook.grades().student_grade(1, "2021-00123")?;
//! println!("Final grade: {:.2}", grade.rounded_final());
//! # Ok(())
//! # }
//! ```
mod assessment; // Gradable items of a class.
pub mod config; // Construction-time configuration.
mod connection; // HTTP requests to the remote API.
pub mod credentials; // Remote API credentials (environment or system keyring).
mod error;
pub mod grade; // Weighted aggregation.
mod gradebook;
pub mod json_store;
mod period;
pub mod remote_store;
mod rubric; // Rubric configuration store.
mod score; // Score ledger.
pub mod store;
mod student;
pub mod tiered_store;

// Exports key structures for external use.
pub use assessment::{
    Assessment, AssessmentCatalog, AssessmentUpdate, NewAssessment, DEFAULT_MAX_POINTS,
};
pub use config::{BackendMode, GradebookConfig, RemoteConfig};
pub use credentials::ApiCredentials;
pub use error::{GradebookError, Result, StorageError};
pub use grade::{
    compute_grade, round_off_2_decimals, ComponentBreakdown, GradeBreakdown, GradeEngine,
    ScoreVisibility, StudentGrade, TermBreakdown,
};
pub use gradebook::Gradebook;
pub use period::AcademicPeriod;
pub use rubric::{
    ClassRubric, Component, RubricStore, RubricValidation, TermRubric, PERCENTAGE_EPSILON,
};
pub use score::{
    parse_score_fraction, BulkUpsertReport, MatrixCell, Score, ScoreEntry, ScoreLedger,
    ScoreMatrix, ScoreWrite,
};
pub use store::GradeStore;
pub use student::Student;

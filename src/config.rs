//! Construction-time configuration of a [`Gradebook`](crate::Gradebook).
//!
//! Everything the engine needs to know about where data lives and how strict it
//! should be is carried here and handed over when the gradebook is opened.

use crate::credentials::ApiCredentials;
use crate::rubric::{ClassRubric, RubricValidation};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fixed timeout for remote API calls before falling back to local files.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_MIDTERM_PERCENTAGE: f64 = 33.0;
pub const DEFAULT_FINAL_PERCENTAGE: f64 = 67.0;

const DATA_DIR_NAME: &str = "classroom_gradebook";

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteConfig {
    pub credentials: ApiCredentials,
    pub timeout: Duration,
}

impl RemoteConfig {
    pub fn new(credentials: ApiCredentials) -> Self {
        RemoteConfig {
            credentials,
            timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }
}

/// Which storage tiers back the gradebook.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BackendMode {
    /// JSON files in `storage_dir` only.
    #[default]
    LocalOnly,
    /// Remote API first; local JSON files when the API cannot be reached.
    RemoteWithFallback(RemoteConfig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradebookConfig {
    pub storage_dir: PathBuf,
    pub backend: BackendMode,
    pub rubric_validation: RubricValidation,
    pub default_midterm_percentage: f64,
    pub default_final_percentage: f64,
}

impl Default for GradebookConfig {
    fn default() -> Self {
        GradebookConfig::local(Self::default_data_dir())
    }
}

impl GradebookConfig {
    /// Local-only configuration storing its JSON files in `storage_dir`.
    pub fn local(storage_dir: impl AsRef<Path>) -> Self {
        GradebookConfig {
            storage_dir: storage_dir.as_ref().to_path_buf(),
            backend: BackendMode::LocalOnly,
            rubric_validation: RubricValidation::Lenient,
            default_midterm_percentage: DEFAULT_MIDTERM_PERCENTAGE,
            default_final_percentage: DEFAULT_FINAL_PERCENTAGE,
        }
    }

    pub fn with_remote(mut self, remote: RemoteConfig) -> Self {
        self.backend = BackendMode::RemoteWithFallback(remote);
        self
    }

    pub fn with_rubric_validation(mut self, policy: RubricValidation) -> Self {
        self.rubric_validation = policy;
        self
    }

    pub fn with_default_split(mut self, midterm: f64, final_term: f64) -> Self {
        self.default_midterm_percentage = midterm;
        self.default_final_percentage = final_term;
        self
    }

    pub fn default_rubric(&self) -> ClassRubric {
        ClassRubric::default_split(
            self.default_midterm_percentage,
            self.default_final_percentage,
        )
    }

    /// Platform data directory (e.g. `~/.local/share/classroom_gradebook`), or the
    /// working directory when the platform reports none.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DATA_DIR_NAME)
    }

    /// Builds a configuration from the environment.
    ///
    /// - `GRADEBOOK_DATA_DIR`: storage directory (defaults to [`GradebookConfig::default_data_dir`]).
    /// - `GRADEBOOK_STRICT_RUBRICS`: `true` rejects rubrics whose components do not sum to 100.
    /// - `GRADEBOOK_API_TIMEOUT_SECS`: remote timeout in seconds.
    ///
    /// The remote tier is enabled when API credentials can be discovered
    /// (see [`ApiCredentials::discover`]).
    pub fn from_env() -> Self {
        let storage_dir = env::var("GRADEBOOK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_data_dir());

        let mut config = GradebookConfig::local(storage_dir);
        if env::var("GRADEBOOK_STRICT_RUBRICS").unwrap_or_default() == "true" {
            config.rubric_validation = RubricValidation::Strict;
        }

        if let Some(credentials) = ApiCredentials::discover() {
            let timeout = env::var("GRADEBOOK_API_TIMEOUT_SECS")
                .ok()
                .and_then(|raw| raw.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REMOTE_TIMEOUT);
            config = config.with_remote(RemoteConfig {
                credentials,
                timeout,
            });
        }
        config
    }
}

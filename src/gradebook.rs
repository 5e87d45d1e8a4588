use crate::assessment::AssessmentCatalog;
use crate::config::GradebookConfig;
use crate::error::Result;
use crate::grade::GradeEngine;
use crate::rubric::RubricStore;
use crate::score::ScoreLedger;
use crate::store::{open_store, GradeStore};

/// Main interface of the crate.
///
/// Owns the configuration and the storage tiers it selects, and hands out the
/// four services that operate on them. Every call is synchronous and completes
/// before returning.
pub struct Gradebook {
    config: GradebookConfig,
    store: Box<dyn GradeStore>,
}

impl Gradebook {
    /// Opens the storage selected by `config.backend`, creating the local
    /// storage directory when needed.
    pub fn open(config: GradebookConfig) -> Result<Self> {
        let store = open_store(&config)?;
        Ok(Gradebook { config, store })
    }

    /// Uses a caller-provided storage implementation.
    pub fn with_store(config: GradebookConfig, store: Box<dyn GradeStore>) -> Self {
        Gradebook { config, store }
    }

    pub fn config(&self) -> &GradebookConfig {
        &self.config
    }

    pub fn rubrics(&self) -> RubricStore<'_> {
        RubricStore::new(self.store.as_ref(), &self.config)
    }

    pub fn assessments(&self) -> AssessmentCatalog<'_> {
        AssessmentCatalog::new(self.store.as_ref())
    }

    pub fn scores(&self) -> ScoreLedger<'_> {
        ScoreLedger::new(self.store.as_ref())
    }

    pub fn grades(&self) -> GradeEngine<'_> {
        GradeEngine::new(self.store.as_ref(), &self.config)
    }
}

//! Generator binding: the contract every report computation implements
use std::sync::Arc;
use thiserror::Error;

use crate::data_model::ReportData;
use crate::error::ReportError;
use crate::options::OptionSet;

/// Produces the raw data for one report under one option set.
///
/// Implementations run on a blocking worker and may take as long as they
/// need; the cache coordinator bounds them with a timeout.
pub trait Generator: Send + Sync {
    fn generate(&self, report_id: &str, options: &OptionSet) -> Result<ReportData, GenerationError>;
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("{0}")]
    Failed(String),

    #[error("option {0} has an unusable value")]
    BadOption(String),
}

impl From<GenerationError> for ReportError {
    fn from(err: GenerationError) -> Self {
        ReportError::GenerationFailed(err.to_string())
    }
}

/// Adapts a closure into a [`Generator`].
pub struct FnGenerator<F>(F);

impl<F> Generator for FnGenerator<F>
where
    F: Fn(&str, &OptionSet) -> Result<ReportData, GenerationError> + Send + Sync,
{
    fn generate(&self, report_id: &str, options: &OptionSet) -> Result<ReportData, GenerationError> {
        (self.0)(report_id, options)
    }
}

pub fn from_fn<F>(f: F) -> Arc<dyn Generator>
where
    F: Fn(&str, &OptionSet) -> Result<ReportData, GenerationError> + Send + Sync + 'static,
{
    Arc::new(FnGenerator(f))
}

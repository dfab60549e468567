//! Report Registry
use report_core::{ReportDefinition, ReportError};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("report {0} registered twice")]
    DuplicateReport(String),
}

/// Read-only after construction; share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ReportRegistry {
    reports: Vec<Arc<ReportDefinition>>,
    index: HashMap<String, usize>,
}

impl ReportRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn lookup(&self, id: &str) -> Result<Arc<ReportDefinition>, ReportError> {
        self.get(id)
            .cloned()
            .ok_or_else(|| ReportError::NotFound(format!("report {}", id)))
    }

    pub fn get(&self, id: &str) -> Option<&Arc<ReportDefinition>> {
        self.index.get(id).and_then(|&i| self.reports.get(i))
    }

    /// Definitions in registration order.
    pub fn list(&self) -> &[Arc<ReportDefinition>] {
        &self.reports
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    reports: Vec<Arc<ReportDefinition>>,
    index: HashMap<String, usize>,
}

impl RegistryBuilder {
    pub fn register(mut self, definition: ReportDefinition) -> Result<Self, RegistryError> {
        let id = definition.id().to_string();
        if self.index.contains_key(&id) {
            return Err(RegistryError::DuplicateReport(id));
        }
        self.index.insert(id, self.reports.len());
        self.reports.push(Arc::new(definition));
        Ok(self)
    }

    pub fn build(self) -> ReportRegistry {
        ReportRegistry {
            reports: self.reports,
            index: self.index,
        }
    }
}

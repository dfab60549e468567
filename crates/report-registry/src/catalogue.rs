//! YAML report catalogue
//!
//! ```yaml
//! version: "1.0"
//! reports:
//!   - id: tagless-datasets
//!     title: Tagless datasets
//!     generator: fixture
//!     option_defaults:
//!       organization: null
//!       include_sub_organizations: false
//!     rows:
//!       - name: river-levels
//!         organization: environment-agency
//! ```
//!
//! `generator` names a binding supplied by the host. The name `fixture` is
//! always available and serves the entry's inline `rows`.

use report_core::{DefinitionError, Generator, ReportDefinition, Row};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::fixture::FixtureGenerator;
use crate::registry::{RegistryError, ReportRegistry};

/// Binding name served by [`FixtureGenerator`].
pub const FIXTURE_BINDING: &str = "fixture";

#[derive(Error, Debug)]
pub enum CatalogueError {
    #[error("Failed to read catalogue file: {0}")]
    Io(String),

    #[error("Failed to parse catalogue YAML: {0}")]
    Parse(String),

    #[error("report {report} names unknown generator {generator}")]
    UnknownGenerator { report: String, generator: String },

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogueFile {
    pub version: String,
    #[serde(default)]
    pub reports: Vec<ReportEntry>,
}

/// A single report declaration
#[derive(Debug, Clone, Deserialize)]
pub struct ReportEntry {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub template: Option<String>,
    /// Declaration order is preserved.
    #[serde(default)]
    pub option_defaults: Map<String, Value>,
    #[serde(default)]
    pub option_combinations: Option<Vec<BTreeMap<String, Value>>>,
    pub generator: String,
    #[serde(default)]
    pub rows: Vec<Row>,
}

/// Named generators the host makes available to the catalogue.
#[derive(Default, Clone)]
pub struct GeneratorBindings {
    bindings: HashMap<String, Arc<dyn Generator>>,
}

impl GeneratorBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: impl Into<String>, generator: Arc<dyn Generator>) -> Self {
        self.bindings.insert(name.into(), generator);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Generator>> {
        self.bindings.get(name).cloned()
    }
}

impl CatalogueFile {
    pub fn load(path: &str) -> Result<Self, CatalogueError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CatalogueError::Io(e.to_string()))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, CatalogueError> {
        serde_yaml::from_str(yaml).map_err(|e| CatalogueError::Parse(e.to_string()))
    }

    pub fn into_registry(self, bindings: &GeneratorBindings) -> Result<ReportRegistry, CatalogueError> {
        let mut builder = ReportRegistry::builder();
        for entry in self.reports {
            let definition = entry.into_definition(bindings)?;
            debug!(report = %definition.id(), "registered report");
            builder = builder.register(definition)?;
        }
        Ok(builder.build())
    }
}

impl ReportEntry {
    fn into_definition(self, bindings: &GeneratorBindings) -> Result<ReportDefinition, CatalogueError> {
        let generator: Arc<dyn Generator> = if self.generator == FIXTURE_BINDING {
            Arc::new(FixtureGenerator::new(self.rows))
        } else {
            bindings
                .get(&self.generator)
                .ok_or_else(|| CatalogueError::UnknownGenerator {
                    report: self.id.clone(),
                    generator: self.generator.clone(),
                })?
        };

        let mut builder = ReportDefinition::builder(self.id, generator).description(self.description);
        if let Some(title) = self.title {
            builder = builder.title(title);
        }
        if let Some(template) = self.template {
            builder = builder.template(template);
        }
        for (name, default) in self.option_defaults {
            builder = builder.option(name, default);
        }
        if let Some(combinations) = self.option_combinations {
            builder = builder.combinations(combinations);
        }
        Ok(builder.build()?)
    }
}

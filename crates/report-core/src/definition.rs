//! Report definitions: identity, declared options and generator binding
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::generator::Generator;
use crate::options::OptionSet;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DefinitionError {
    #[error("report id must not be empty")]
    EmptyId,

    #[error("report {report} declares option {option} twice")]
    DuplicateOption { report: String, option: String },

    #[error("report {report} lists option {option} in a combination but does not declare it")]
    UndeclaredCombinationOption { report: String, option: String },
}

/// A registered report. Immutable once built.
#[derive(Clone)]
pub struct ReportDefinition {
    id: String,
    title: String,
    description: String,
    template: String,
    option_defaults: Vec<(String, Value)>,
    option_combinations: Option<Vec<BTreeMap<String, Value>>>,
    generator: Arc<dyn Generator>,
}

impl ReportDefinition {
    pub fn builder(id: impl Into<String>, generator: Arc<dyn Generator>) -> ReportDefinitionBuilder {
        let id = id.into();
        ReportDefinitionBuilder {
            title: id.clone(),
            template: format!("report/{}", id),
            id,
            description: String::new(),
            option_defaults: Vec::new(),
            option_combinations: None,
            generator,
        }
    }

    /// Unique registry id; also the first segment of every cache key.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display title. Defaults to the id.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Free text shown on the index page. May be empty.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Name of the template that presents this report's data.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Declared options in declaration order.
    pub fn option_defaults(&self) -> &[(String, Value)] {
        &self.option_defaults
    }

    pub fn default_for(&self, option: &str) -> Option<&Value> {
        self.option_defaults
            .iter()
            .find(|(name, _)| name == option)
            .map(|(_, value)| value)
    }

    pub fn declares(&self, option: &str) -> bool {
        self.default_for(option).is_some()
    }

    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    /// Option sets worth pre-generating. Falls back to the defaults alone.
    pub fn option_combinations(&self) -> Vec<OptionSet> {
        match &self.option_combinations {
            Some(combinations) => combinations
                .iter()
                .map(|combination| OptionSet::with_overrides(self, combination))
                .collect(),
            None => vec![OptionSet::defaults(self)],
        }
    }

    /// Serializable view without the generator, for listings and templates.
    pub fn summary(&self) -> Value {
        let defaults: Map<String, Value> = self.option_defaults.iter().cloned().collect();
        json!({
            "name": self.id,
            "title": self.title,
            "description": self.description,
            "option_defaults": defaults,
            "template": self.template,
        })
    }
}

impl fmt::Debug for ReportDefinition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ReportDefinition")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("template", &self.template)
            .field("option_defaults", &self.option_defaults)
            .finish_non_exhaustive()
    }
}

pub struct ReportDefinitionBuilder {
    id: String,
    title: String,
    description: String,
    template: String,
    option_defaults: Vec<(String, Value)>,
    option_combinations: Option<Vec<BTreeMap<String, Value>>>,
    generator: Arc<dyn Generator>,
}

impl ReportDefinitionBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn option(mut self, name: impl Into<String>, default: Value) -> Self {
        self.option_defaults.push((name.into(), default));
        self
    }

    pub fn combinations(mut self, combinations: Vec<BTreeMap<String, Value>>) -> Self {
        self.option_combinations = Some(combinations);
        self
    }

    pub fn build(self) -> Result<ReportDefinition, DefinitionError> {
        if self.id.trim().is_empty() {
            return Err(DefinitionError::EmptyId);
        }

        for (i, (name, _)) in self.option_defaults.iter().enumerate() {
            if self.option_defaults[..i].iter().any(|(seen, _)| seen == name) {
                return Err(DefinitionError::DuplicateOption {
                    report: self.id.clone(),
                    option: name.clone(),
                });
            }
        }

        for combination in self.option_combinations.iter().flatten() {
            if let Some(option) = combination
                .keys()
                .find(|key| !self.option_defaults.iter().any(|(name, _)| name == *key))
            {
                return Err(DefinitionError::UndeclaredCombinationOption {
                    report: self.id.clone(),
                    option: option.clone(),
                });
            }
        }

        Ok(ReportDefinition {
            id: self.id,
            title: self.title,
            description: self.description,
            template: self.template,
            option_defaults: self.option_defaults,
            option_combinations: self.option_combinations,
            generator: self.generator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_model::ReportData;
    use crate::generator::from_fn;

    fn empty_generator() -> Arc<dyn Generator> {
        from_fn(|_, _| Ok(ReportData::records(vec![])))
    }

    #[test]
    fn test_builder_defaults() {
        let def = ReportDefinition::builder("tagless-datasets", empty_generator())
            .option("organization", Value::Null)
            .build()
            .unwrap();
        assert_eq!(def.title(), "tagless-datasets");
        assert_eq!(def.template(), "report/tagless-datasets");
        assert!(def.declares("organization"));
        assert!(!def.declares("format"));
    }

    #[test]
    fn test_duplicate_option_rejected() {
        let err = ReportDefinition::builder("r", empty_generator())
            .option("organization", Value::Null)
            .option("organization", json!("x"))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            DefinitionError::DuplicateOption {
                report: "r".into(),
                option: "organization".into()
            }
        );
    }

    #[test]
    fn test_combinations_fall_back_to_defaults() {
        let def = ReportDefinition::builder("r", empty_generator())
            .option("include_private", json!(false))
            .build()
            .unwrap();
        let combos = def.option_combinations();
        assert_eq!(combos.len(), 1);
        assert_eq!(combos[0].get("include_private"), Some(&json!(false)));
    }

    #[test]
    fn test_undeclared_combination_option_rejected() {
        let mut combo = BTreeMap::new();
        combo.insert("colour".to_string(), json!("red"));
        let err = ReportDefinition::builder("r", empty_generator())
            .combinations(vec![combo])
            .build()
            .unwrap_err();
        assert!(matches!(err, DefinitionError::UndeclaredCombinationOption { .. }));
    }
}

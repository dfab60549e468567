//! Handlebars template engine.
//!
//! Helpers (in addition to the handlebars built-ins such as `eq`):
//! - truncate: Truncate string to max length
//! - join: Join array with separator
//! - default: Fallback for null or missing values
//! - render_datetime: Format an RFC 3339 timestamp, `%d/%m/%Y` unless `fmt=` is given

use chrono::{DateTime, Utc};
use handlebars::{handlebars_helper, Handlebars};
use report_core::ReportError;
use serde_json::Value;
use thiserror::Error;

use crate::templates::TemplatesFile;

const BUNDLED_TEMPLATES: &str = include_str!("../templates/report-templates.yaml");

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template {0} not found")]
    NotFound(String),

    #[error("Template load failed: {0}")]
    Load(String),

    #[error("Render error: {0}")]
    Render(String),
}

impl From<TemplateError> for ReportError {
    fn from(err: TemplateError) -> Self {
        ReportError::Template(err.to_string())
    }
}

/// Anything that can render a named template against JSON data.
pub trait TemplateEngine: Send + Sync {
    /// Fails with [`TemplateError::NotFound`] for unknown names.
    fn render(&self, name: &str, data: &Value) -> Result<String, TemplateError>;

    fn has_template(&self, name: &str) -> bool;
}

/// Compiled renderer with registered helpers
pub struct TemplateRenderer {
    handlebars: Handlebars<'static>,
    templates: TemplatesFile,
}

impl TemplateRenderer {
    pub fn new(templates: TemplatesFile) -> Result<Self, TemplateError> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);

        handlebars.register_helper("truncate", Box::new(truncate));
        handlebars.register_helper("join", Box::new(join));
        handlebars.register_helper("default", Box::new(default_value));
        handlebars.register_helper("render_datetime", Box::new(render_datetime));

        for (name, template) in &templates.templates {
            handlebars
                .register_template_string(name, &template.template)
                .map_err(|e| TemplateError::Load(format!("{}: {}", name, e)))?;
        }

        Ok(TemplateRenderer {
            handlebars,
            templates,
        })
    }

    /// The templates shipped with the crate.
    pub fn bundled() -> Result<Self, TemplateError> {
        let templates =
            TemplatesFile::from_yaml(BUNDLED_TEMPLATES).map_err(TemplateError::Load)?;
        Self::new(templates)
    }

    /// Bundled templates overlaid with the ones in `path`.
    pub fn with_overrides(path: &str) -> Result<Self, TemplateError> {
        let mut templates =
            TemplatesFile::from_yaml(BUNDLED_TEMPLATES).map_err(TemplateError::Load)?;
        templates.merge(TemplatesFile::load(path).map_err(TemplateError::Load)?);
        Self::new(templates)
    }

    /// Render a template string directly (not from file)
    pub fn render_string(&self, template: &str, data: &Value) -> Result<String, TemplateError> {
        self.handlebars
            .render_template(template, data)
            .map_err(|e| TemplateError::Render(e.to_string()))
    }

    pub fn list_templates(&self) -> Vec<&str> {
        self.templates.list_templates()
    }
}

impl TemplateEngine for TemplateRenderer {
    fn render(&self, name: &str, data: &Value) -> Result<String, TemplateError> {
        if !self.handlebars.has_template(name) {
            return Err(TemplateError::NotFound(name.to_string()));
        }
        self.handlebars
            .render(name, data)
            .map_err(|e| TemplateError::Render(e.to_string()))
    }

    fn has_template(&self, name: &str) -> bool {
        self.handlebars.has_template(name)
    }
}

// ============================================================================
// Custom Helpers
// ============================================================================

handlebars_helper!(truncate: |text: str, max: u64| {
    let max = usize::try_from(max).unwrap_or(usize::MAX);
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
});

handlebars_helper!(join: |items: array, separator: str| {
    items
        .iter()
        .map(|v| v.as_str().map(String::from).unwrap_or_else(|| v.to_string()))
        .collect::<Vec<_>>()
        .join(separator)
});

handlebars_helper!(default_value: |value: Json, fallback: str| {
    match value {
        Value::Null => fallback.to_string(),
        Value::String(s) if s.is_empty() => fallback.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
});

handlebars_helper!(render_datetime: |value: Json, {fmt: str = "%d/%m/%Y"}| {
    format_datetime(value, fmt)
});

/// RFC 3339 text in `fmt`. Anything unparseable, including a bad `fmt`,
/// comes back as the raw text.
fn format_datetime(value: &Value, fmt: &str) -> String {
    use std::fmt::Write as _;

    let Some(raw) = value.as_str() else {
        return String::new();
    };
    let Ok(parsed) = DateTime::parse_from_rfc3339(raw) else {
        return raw.to_string();
    };
    let mut out = String::new();
    match write!(out, "{}", parsed.with_timezone(&Utc).format(fmt)) {
        Ok(()) => out,
        Err(_) => raw.to_string(),
    }
}

//! Report Out: renders cached artifacts as html, csv or json
//!
//! `csv` and `json` first normalize the data (positional rows become named
//! rows, identity columns are redacted when an anonymizer is configured).
//! `html` passes the artifact through a template engine untouched.
//!
//! # Example
//!
//! ```ignore
//! use report_out::{Format, Renderer, RenderRequest, TemplateRenderer};
//!
//! let renderer = Renderer::new(Arc::new(TemplateRenderer::bundled()?));
//! let response = renderer.render(&RenderRequest {
//!     definition: &definition,
//!     artifact: &artifact,
//!     key: &cache.key_get(&definition, &options),
//!     format: Format::parse(Some("csv"))?,
//!     options: &options,
//!     options_html: &[],
//! })?;
//! ```

pub mod csv;
pub mod html;
pub mod json;
pub mod normalize;
pub mod renderer;
pub mod response;
pub mod templates;

pub use normalize::{ensure_records, redact_identities, Anonymizer, HashingAnonymizer, IDENTITY_COLUMNS};
pub use renderer::{TemplateEngine, TemplateError, TemplateRenderer};
pub use response::{Body, RenderedResponse};
pub use templates::TemplatesFile;

use report_core::{
    CacheKey, CachedArtifact, OptionDisplay, OptionSet, ReportData, ReportDefinition, ReportError,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Output encodings a report can be rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Html,
    Csv,
    Json,
}

impl Format {
    /// `None`, empty and `html` all mean html.
    pub fn parse(raw: Option<&str>) -> Result<Self, ReportError> {
        match raw {
            None | Some("") | Some("html") => Ok(Format::Html),
            Some("csv") => Ok(Format::Csv),
            Some("json") => Ok(Format::Json),
            Some(other) => Err(ReportError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Html => "html",
            Format::Csv => "csv",
            Format::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Html => "text/html; charset=utf-8",
            Format::Csv => "application/csv",
            Format::Json => "application/json",
        }
    }
}

/// Everything one render needs.
pub struct RenderRequest<'a> {
    pub definition: &'a ReportDefinition,
    pub artifact: &'a CachedArtifact,
    /// Stable key of the report and options; names csv downloads.
    pub key: &'a CacheKey,
    pub format: Format,
    pub options: &'a OptionSet,
    /// Rendered option fragments, in option order. Only used for html.
    pub options_html: &'a [(String, String)],
}

pub struct Renderer {
    templates: Arc<dyn TemplateEngine>,
    anonymizer: Option<Arc<dyn Anonymizer>>,
}

impl Renderer {
    pub fn new(templates: Arc<dyn TemplateEngine>) -> Self {
        Self {
            templates,
            anonymizer: None,
        }
    }

    pub fn with_anonymizer(mut self, anonymizer: Arc<dyn Anonymizer>) -> Self {
        self.anonymizer = Some(anonymizer);
        self
    }

    pub fn render(&self, request: &RenderRequest<'_>) -> Result<RenderedResponse, ReportError> {
        debug!(
            report = %request.definition.id(),
            format = request.format.as_str(),
            "rendering report"
        );

        match request.format {
            Format::Html => {
                let page = html::render_view(self.templates.as_ref(), request)?;
                Ok(RenderedResponse::ok(Format::Html.content_type(), page))
            }
            Format::Csv => {
                let data = self.normalized(request);
                let rows = data.table.records().unwrap_or_default();
                let body = csv::render_csv(rows)?;
                let filename = request.key.file_name("csv");
                Ok(RenderedResponse::ok(Format::Csv.content_type(), body).with_header(
                    "Content-Disposition",
                    format!("attachment; filename={}", filename),
                ))
            }
            Format::Json => {
                let data = self.normalized(request);
                let body = json::render_json(&data, request.artifact.generated_at)
                    .map_err(|e| ReportError::Render(e.to_string()))?;
                Ok(RenderedResponse::ok(Format::Json.content_type(), body))
            }
        }
    }

    /// A copy of the artifact data with named rows and identities redacted.
    fn normalized(&self, request: &RenderRequest<'_>) -> ReportData {
        let mut data = request.artifact.data.clone();
        ensure_records(&mut data);
        redact_identities(
            &mut data,
            self.anonymizer.as_deref(),
            request.options.organization(),
        );
        data
    }

    /// Render the display fragment of each option. A missing fragment
    /// template is skipped with a warning.
    pub fn option_fragments(
        &self,
        displays: &[OptionDisplay],
    ) -> Result<Vec<(String, String)>, ReportError> {
        let mut fragments = Vec::new();
        for display in displays {
            let template = format!("option_{}", display.name);
            let data = serde_json::json!({
                "name": display.name,
                "value": display.value,
                "default": display.default,
            });
            match self.templates.render(&template, &data) {
                Ok(fragment) => fragments.push((display.name.clone(), fragment)),
                Err(TemplateError::NotFound(_)) => {
                    let option_name = &display.name;
                    warn!(
                        option = %option_name,
                        "not displaying report option as no template found"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(fragments)
    }

    /// The catalogue page.
    pub fn render_index(
        &self,
        reports: &[Arc<ReportDefinition>],
    ) -> Result<RenderedResponse, ReportError> {
        let page = html::render_index(self.templates.as_ref(), reports)?;
        Ok(RenderedResponse::ok(Format::Html.content_type(), page))
    }
}

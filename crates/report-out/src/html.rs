//! Page assembly for the html format.
use chrono::SecondsFormat;
use report_core::{ReportDefinition, ReportError, REPORT_ENGINE_VERSION};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::warn;

use crate::renderer::TemplateEngine;
use crate::RenderRequest;

pub const INDEX_TEMPLATE: &str = "report/index";
pub const VIEW_TEMPLATE: &str = "report/view";

/// Values handed to `report/view` and the report's own template.
pub fn view_context(request: &RenderRequest<'_>) -> Value {
    let data = &request.artifact.data;
    let options_html: Map<String, Value> = request
        .options_html
        .iter()
        .map(|(name, fragment)| (name.clone(), Value::String(fragment.clone())))
        .collect();

    json!({
        "report": request.definition.summary(),
        "report_name": request.definition.id(),
        "data": data,
        "report_date": request
            .artifact
            .generated_at
            .to_rfc3339_opts(SecondsFormat::Micros, true),
        "options": request.options.to_json(),
        "options_html": options_html,
        "report_template": request.definition.template(),
        "are_some_results": data.has_results(),
        "engine_version": REPORT_ENGINE_VERSION,
    })
}

pub fn render_view(
    engine: &dyn TemplateEngine,
    request: &RenderRequest<'_>,
) -> Result<String, ReportError> {
    let mut context = view_context(request);
    let template = request.definition.template();

    if engine.has_template(template) {
        let report_html = engine.render(template, &context)?;
        if let Value::Object(map) = &mut context {
            map.insert("report_html".to_string(), Value::String(report_html));
        }
    } else {
        warn!(
            report = %request.definition.id(),
            template = %template,
            "report template not found, rendering page without it"
        );
    }

    Ok(engine.render(VIEW_TEMPLATE, &context)?)
}

pub fn render_index(
    engine: &dyn TemplateEngine,
    reports: &[Arc<ReportDefinition>],
) -> Result<String, ReportError> {
    let summaries: Vec<Value> = reports.iter().map(|report| report.summary()).collect();
    Ok(engine.render(INDEX_TEMPLATE, &json!({ "reports": summaries }))?)
}

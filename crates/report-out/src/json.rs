//! JSON encoding: the report data object plus `generated_at`.
use chrono::{DateTime, SecondsFormat, Utc};
use report_core::ReportData;
use serde_json::Value;

pub fn render_json(data: &ReportData, generated_at: DateTime<Utc>) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(data)?;
    if let Value::Object(map) = &mut value {
        map.insert(
            "generated_at".to_string(),
            Value::String(generated_at.to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
    }
    serde_json::to_string(&value)
}

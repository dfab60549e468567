//! Cache keys: deterministic text encoding of (report id, option set)
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::definition::ReportDefinition;
use crate::options::OptionSet;

/// Identifies one cached artifact.
///
/// Built from the definition's defaults overlaid with the option set, so an
/// option left at its default and an option never supplied produce the same
/// key. Pairs are sorted by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    report_id: String,
    canonical: String,
}

impl CacheKey {
    pub fn new(definition: &ReportDefinition, options: &OptionSet) -> Self {
        let mut merged: BTreeMap<&str, &Value> = definition
            .option_defaults()
            .iter()
            .map(|(name, value)| (name.as_str(), value))
            .collect();
        for (name, value) in options.iter() {
            merged.insert(name, value);
        }

        let report_id = definition.id().to_string();
        let canonical = if merged.is_empty() {
            report_id.clone()
        } else {
            let query = merged
                .iter()
                .map(|(name, value)| {
                    format!("{}={}", percent_encode(name), percent_encode(&encode_value(value)))
                })
                .collect::<Vec<_>>()
                .join("&");
            format!("{}?{}", report_id, query)
        };

        Self { report_id, canonical }
    }

    pub fn report_id(&self) -> &str {
        &self.report_id
    }

    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Download filename for this key: `tagless?sort=name` becomes
    /// `report_tagless_sort_name.csv`.
    pub fn file_name(&self, extension: &str) -> String {
        let stem: String = self
            .canonical
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("report_{}.{}", stem, extension)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

fn encode_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
pub fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

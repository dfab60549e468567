//! Option Resolver: raw request parameters to a canonical option set
//!
//! Resolution happens in two passes with different strictness:
//!
//! ```text
//! raw params ──resolve──▶ ResolvedRequest ──display_options──▶ fragments (unknown keys warn)
//!                               │
//!                               └──option_set──▶ OptionSet (unknown keys fail)
//! ```
//!
//! The permissive pass runs while preparing the page; the strict pass runs
//! right before anything is generated.
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use crate::definition::ReportDefinition;
use crate::error::ReportError;

/// Transport parameter selecting the output encoding.
pub const FORMAT_PARAM: &str = "format";
/// Transport parameter forcing regeneration.
pub const REFRESH_PARAM: &str = "refresh";
/// Option bound from the URL path rather than the query string.
pub const ORGANIZATION_OPTION: &str = "organization";

/// Parse a boolean request token. Returns `None` for anything unrecognized.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "y" | "t" | "1" => Some(true),
        "false" | "no" | "off" | "n" | "f" | "0" => Some(false),
        _ => None,
    }
}

fn is_reserved(name: &str) -> bool {
    name == FORMAT_PARAM || name == REFRESH_PARAM
}

/// First value wins when a parameter is repeated.
fn first<'a>(raw: &'a [(String, String)], name: &str) -> Option<&'a str> {
    raw.iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// Canonical mapping of option name to resolved value for one request.
///
/// Keys are always declared by the owning definition. Ordering is by name,
/// so two sets built in different orders compare equal.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OptionSet(BTreeMap<String, Value>);

impl OptionSet {
    /// Every declared option at its default value.
    pub fn defaults(definition: &ReportDefinition) -> Self {
        Self(definition.option_defaults().iter().cloned().collect())
    }

    /// Defaults overlaid with the given values. Undeclared keys are ignored.
    pub fn with_overrides(definition: &ReportDefinition, overrides: &BTreeMap<String, Value>) -> Self {
        let mut set = Self::defaults(definition);
        for (name, value) in overrides {
            if definition.declares(name) {
                set.0.insert(name.clone(), value.clone());
            }
        }
        set
    }

    /// The resolved value of one option.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Options in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of resolved options.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The organization context, when one is set and non-empty.
    pub fn organization(&self) -> Option<&str> {
        self.0
            .get(ORGANIZATION_OPTION)
            .and_then(Value::as_str)
            .filter(|org| !org.is_empty())
    }

    /// JSON object form, used as the template context for option values.
    pub fn to_json(&self) -> Value {
        Value::Object(self.0.clone().into_iter().collect())
    }
}

/// How a non-canonical request should be redirected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalRedirect {
    /// Remove the organization from both path and query.
    StripOrganization,
    /// Use the path form with this organization.
    Organization(String),
}

/// One option prepared for its display fragment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionDisplay {
    pub name: String,
    pub value: Value,
    pub default: Value,
}

/// Output of the permissive pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest {
    report_id: String,
    draft: Vec<(String, Value)>,
    pub format: Option<String>,
    pub refresh: bool,
}

impl ResolvedRequest {
    /// Options that get a display fragment. Unrecognized parameters are
    /// skipped with a warning.
    pub fn display_options(&self, definition: &ReportDefinition) -> Vec<OptionDisplay> {
        self.draft
            .iter()
            .filter_map(|(name, value)| match definition.default_for(name) {
                Some(default) => Some(OptionDisplay {
                    name: name.clone(),
                    value: value.clone(),
                    default: default.clone(),
                }),
                None => {
                    warn!(
                        report = %self.report_id,
                        param = %name,
                        "not displaying report option as option not recognized"
                    );
                    None
                }
            })
            .collect()
    }

    /// The strict checkpoint: fails on the first unrecognized parameter.
    pub fn option_set(&self, definition: &ReportDefinition) -> Result<OptionSet, ReportError> {
        let mut options = BTreeMap::new();
        for (name, value) in &self.draft {
            if !definition.declares(name) {
                return Err(ReportError::InvalidOption(name.clone()));
            }
            options.insert(name.clone(), value.clone());
        }
        Ok(OptionSet(options))
    }

    /// True when any format parameter was supplied at all.
    pub fn has_format(&self) -> bool {
        matches!(self.format.as_deref(), Some(format) if !format.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Redirect(CanonicalRedirect),
    Resolved(ResolvedRequest),
}

pub struct OptionResolver<'a> {
    definition: &'a ReportDefinition,
}

impl<'a> OptionResolver<'a> {
    pub fn new(definition: &'a ReportDefinition) -> Self {
        Self { definition }
    }

    /// Decide whether the organization was placed where this report expects
    /// it. `path_org` is the organization path segment, if any.
    pub fn canonical_redirect(
        &self,
        path_org: Option<&str>,
        raw: &[(String, String)],
    ) -> Option<CanonicalRedirect> {
        let declares_org = self.definition.declares(ORGANIZATION_OPTION);

        if path_org.is_some() && !declares_org {
            return Some(CanonicalRedirect::StripOrganization);
        }

        if path_org.is_none() && declares_org {
            let default_org = self
                .definition
                .default_for(ORGANIZATION_OPTION)
                .and_then(Value::as_str)
                .filter(|org| !org.is_empty());
            if let Some(org) = default_org {
                return Some(CanonicalRedirect::Organization(org.to_string()));
            }
        }

        match first(raw, ORGANIZATION_OPTION) {
            None => None,
            Some(_) if !declares_org => Some(CanonicalRedirect::StripOrganization),
            Some("") => Some(match path_org {
                Some(org) => CanonicalRedirect::Organization(org.to_string()),
                None => CanonicalRedirect::StripOrganization,
            }),
            Some(org) => Some(CanonicalRedirect::Organization(org.to_string())),
        }
    }

    pub fn resolve(&self, raw: &[(String, String)], path_org: Option<&str>) -> Resolution {
        if let Some(redirect) = self.canonical_redirect(path_org, raw) {
            return Resolution::Redirect(redirect);
        }

        let report_id = self.definition.id();
        let format = first(raw, FORMAT_PARAM).map(str::to_string);
        let refresh = match first(raw, REFRESH_PARAM) {
            None => false,
            Some(token) => parse_bool(token).unwrap_or_else(|| {
                warn!(report = %report_id, value = %token, "unparseable refresh flag, treating as false");
                false
            }),
        };

        let mut draft: Vec<(String, Value)> = Vec::new();
        for (name, default) in self.definition.option_defaults() {
            let value = if name == ORGANIZATION_OPTION {
                path_org
                    .map(|org| Value::String(org.to_string()))
                    .unwrap_or(Value::Null)
            } else {
                match first(raw, name) {
                    Some(raw_value) => self.coerce(name, default, raw_value),
                    None => default.clone(),
                }
            };
            draft.push((name.clone(), value));
        }

        for (name, value) in raw {
            let already_seen = draft.iter().any(|(seen, _)| seen == name);
            if is_reserved(name) || already_seen {
                continue;
            }
            draft.push((name.clone(), Value::String(value.clone())));
        }

        Resolution::Resolved(ResolvedRequest {
            report_id: report_id.to_string(),
            draft,
            format,
            refresh,
        })
    }

    /// Boolean defaults take boolean tokens; everything else is kept verbatim.
    fn coerce(&self, name: &str, default: &Value, raw_value: &str) -> Value {
        match default {
            Value::Bool(_) => match parse_bool(raw_value) {
                Some(flag) => Value::Bool(flag),
                None => {
                    warn!(
                        report = %self.definition.id(),
                        option = %name,
                        value = %raw_value,
                        "unparseable boolean option, keeping default"
                    );
                    default.clone()
                }
            },
            _ => Value::String(raw_value.to_string()),
        }
    }
}

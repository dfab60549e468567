//! Server configuration from `REPORT_*` environment variables.
use report_core::parse_bool;
use std::env;
use std::time::Duration;

pub const DEFAULT_ADDR: &str = "0.0.0.0:8787";
pub const DEFAULT_GENERATION_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub addr: String,
    /// Reports YAML. The bundled demo catalogue is used when unset.
    pub catalogue_path: Option<String>,
    /// Overrides layered on the bundled templates.
    pub templates_path: Option<String>,
    pub generation_timeout: Duration,
    pub warm_cache: bool,
    pub anonymise: bool,
    /// Users allowed to refresh. Empty means everyone may.
    pub admins: Vec<String>,
    /// Reports limited to named users, as `(report, users)`.
    pub restricted: Vec<(String, Vec<String>)>,
}

impl ServerConfig {
    /// True when any request can be denied.
    pub fn has_access_rules(&self) -> bool {
        !self.admins.is_empty() || !self.restricted.is_empty()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            catalogue_path: None,
            templates_path: None,
            generation_timeout: Duration::from_millis(DEFAULT_GENERATION_TIMEOUT_MS),
            warm_cache: false,
            anonymise: false,
            admins: Vec::new(),
            restricted: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Unparseable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let flag = |name: &str, default: bool| {
            lookup(name)
                .and_then(|v| parse_bool(v.trim()))
                .unwrap_or(default)
        };

        Self {
            addr: non_empty("REPORT_ADDR").unwrap_or(defaults.addr),
            catalogue_path: non_empty("REPORT_CATALOGUE"),
            templates_path: non_empty("REPORT_TEMPLATES"),
            generation_timeout: lookup("REPORT_GENERATION_TIMEOUT_MS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.generation_timeout),
            warm_cache: flag("REPORT_WARM_CACHE", defaults.warm_cache),
            anonymise: flag("REPORT_ANONYMISE", defaults.anonymise),
            admins: user_list(&lookup("REPORT_ADMINS").unwrap_or_default(), ','),
            restricted: lookup("REPORT_RESTRICTED")
                .map(|raw| parse_restrictions(&raw))
                .unwrap_or_default(),
        }
    }
}

fn user_list(raw: &str, separator: char) -> Vec<String> {
    raw.split(separator)
        .map(str::trim)
        .filter(|user| !user.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// `report=user|user;report=user`. Entries without a report name are
/// skipped; a report with no users is closed to everyone but admins.
fn parse_restrictions(raw: &str) -> Vec<(String, Vec<String>)> {
    raw.split(';')
        .filter_map(|entry| {
            let (report, users) = entry.split_once('=').unwrap_or((entry, ""));
            let report = report.trim();
            (!report.is_empty()).then(|| (report.to_string(), user_list(users, '|')))
        })
        .collect()
}

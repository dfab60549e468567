//! Canonical report URLs.
use report_core::{percent_encode, CanonicalRedirect, ORGANIZATION_OPTION};

pub const INDEX_PATH: &str = "/report";

/// `/report/<name>` or `/report/<name>/<organization>`.
pub fn view_path(report: &str, organization: Option<&str>) -> String {
    match organization.filter(|org| !org.is_empty()) {
        Some(org) => format!("{}/{}/{}", INDEX_PATH, percent_encode(report), percent_encode(org)),
        None => format!("{}/{}", INDEX_PATH, percent_encode(report)),
    }
}

/// Append `params` as a query string, keeping their order.
pub fn with_query(path: String, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return path;
    }
    let query = params
        .iter()
        .map(|(name, value)| format!("{}={}", percent_encode(name), percent_encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", path, query)
}

pub fn without_param(params: &[(String, String)], name: &str) -> Vec<(String, String)> {
    params
        .iter()
        .filter(|(key, _)| key != name)
        .cloned()
        .collect()
}

/// Where a non-canonical request is sent. The organization never survives
/// in the query.
pub fn canonical_location(
    report: &str,
    redirect: &CanonicalRedirect,
    params: &[(String, String)],
) -> String {
    let rest = without_param(params, ORGANIZATION_OPTION);
    let organization = match redirect {
        CanonicalRedirect::StripOrganization => None,
        CanonicalRedirect::Organization(org) => Some(org.as_str()),
    };
    with_query(view_path(report, organization), &rest)
}

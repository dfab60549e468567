//! Request Context: who is asking, threaded explicitly through the pipeline
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side effects and reads that the authorization collaborator decides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ListReports,
    ViewReport,
    ReadData,
    Refresh,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            Action::ListReports => "list reports",
            Action::ViewReport => "view report",
            Action::ReadData => "read report data",
            Action::Refresh => "refresh report",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user: Option<String>,
    pub trace_id: String,
    pub report: Option<String>,
    pub organization: Option<String>,
}

impl RequestContext {
    pub fn new(user: Option<String>) -> Self {
        Self {
            user,
            trace_id: uuid::Uuid::new_v4().to_string(),
            report: None,
            organization: None,
        }
    }

    pub fn anonymous() -> Self {
        Self::new(None)
    }

    pub fn for_report(&self, report: &str) -> Self {
        Self {
            report: Some(report.to_string()),
            ..self.clone()
        }
    }

    pub fn with_organization(mut self, organization: Option<&str>) -> Self {
        self.organization = organization.map(str::to_string);
        self
    }

    pub fn user_label(&self) -> &str {
        self.user.as_deref().unwrap_or("anonymous")
    }
}

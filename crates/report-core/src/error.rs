//! Unified Error Model
use thiserror::Error;

use crate::context::Action;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReportError {
    #[error("NOTFOUND/{0}")]
    NotFound(String),

    #[error("AUTH/not authorized to {0}")]
    NotAuthorized(Action),

    #[error("OPTION/Option not allowed by report: {0}")]
    InvalidOption(String),

    #[error("FORMAT/Format not known - try html, json or csv (got {0:?})")]
    UnsupportedFormat(String),

    #[error("GENERATE/{0}")]
    GenerationFailed(String),

    #[error("GENERATE/timed out after {0} ms")]
    GenerationTimedOut(u64),

    #[error("TEMPLATE/{0}")]
    Template(String),

    #[error("RENDER/{0}")]
    Render(String),
}

impl ReportError {
    /// HTTP status code this error surfaces as at the request boundary.
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::NotAuthorized(_) => 401,
            Self::InvalidOption(_) | Self::UnsupportedFormat(_) => 400,
            Self::GenerationTimedOut(_) => 504,
            Self::GenerationFailed(_) | Self::Template(_) | Self::Render(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ReportError::NotFound("x".into()).status(), 404);
        assert_eq!(ReportError::NotAuthorized(Action::Refresh).status(), 401);
        assert_eq!(ReportError::InvalidOption("x".into()).status(), 400);
        assert_eq!(ReportError::UnsupportedFormat("xml".into()).status(), 400);
        assert_eq!(ReportError::GenerationFailed("boom".into()).status(), 500);
        assert_eq!(ReportError::GenerationTimedOut(10).status(), 504);
    }

    #[test]
    fn test_messages_name_the_offender() {
        let err = ReportError::InvalidOption("colour".into());
        assert_eq!(err.to_string(), "OPTION/Option not allowed by report: colour");

        let err = ReportError::NotAuthorized(Action::Refresh);
        assert_eq!(err.to_string(), "AUTH/not authorized to refresh report");
    }
}

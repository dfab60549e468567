//! Transport-neutral response produced by rendering or by the orchestrator.
use report_core::ReportError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Empty,
    Text(String),
    Bytes(Vec<u8>),
}

impl Body {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Empty => &[],
            Body::Text(text) => text.as_bytes(),
            Body::Bytes(bytes) => bytes,
        }
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Body,
    /// Set for 302 responses; mirrored in the `Location` header.
    pub redirect: Option<String>,
}

impl RenderedResponse {
    pub fn ok(content_type: &str, body: impl Into<Body>) -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body: body.into(),
            redirect: None,
        }
    }

    pub fn redirect(location: impl Into<String>) -> Self {
        let location = location.into();
        Self {
            status: 302,
            headers: vec![("Location".to_string(), location.clone())],
            body: Body::Empty,
            redirect: Some(location),
        }
    }

    /// Plain-text error body carrying the error description.
    pub fn error(err: &ReportError) -> Self {
        Self {
            status: err.status(),
            headers: vec![(
                "Content-Type".to_string(),
                "text/plain; charset=utf-8".to_string(),
            )],
            body: Body::Text(err.to_string()),
            redirect: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_redirect(&self) -> bool {
        self.redirect.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_sets_location() {
        let response = RenderedResponse::redirect("/report/openness/ons");
        assert_eq!(response.status, 302);
        assert_eq!(response.header("location"), Some("/report/openness/ons"));
        assert!(response.is_redirect());
        assert!(response.body.as_bytes().is_empty());
    }

    #[test]
    fn test_error_uses_status_and_description() {
        let response = RenderedResponse::error(&ReportError::NotFound("report nope".into()));
        assert_eq!(response.status, 404);
        assert_eq!(response.body, Body::Text("NOTFOUND/report nope".into()));
    }
}

//! Verdict types for authorization decisions
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Allow,
    Deny { reason: String },
}

impl Verdict {
    pub fn allow() -> Self {
        Verdict::Allow
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Verdict::Deny {
            reason: reason.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Verdict::Allow => write!(f, "ALLOW"),
            Verdict::Deny { reason } => write!(f, "DENY: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_serialization() {
        let json = serde_json::to_value(Verdict::deny("admins only")).unwrap();
        assert_eq!(json["type"], "DENY");
        assert_eq!(json["reason"], "admins only");
        assert_eq!(Verdict::allow().to_string(), "ALLOW");
    }
}

//! Report Policy: who may list, view, read and refresh reports
//!
//! # Architecture
//!
//! ```text
//! RequestContext + Action → Authorizer → Verdict (ALLOW/DENY)
//!                               ↓
//!                          AuditLog (when wrapped in AuditedAuthorizer)
//! ```
//!
//! # Example
//!
//! ```
//! use report_core::{Action, RequestContext};
//! use report_policy::{Authorizer, RolePolicy};
//!
//! let policy = RolePolicy::new().with_admin("alice");
//! let ctx = RequestContext::new(Some("bob".to_string())).for_report("openness");
//!
//! assert!(policy.authorize(Action::ViewReport, &ctx).is_allowed());
//! assert!(!policy.authorize(Action::Refresh, &ctx).is_allowed());
//! ```

pub mod audit;
pub mod authorizer;
pub mod verdict;

pub use audit::{AuditEntry, AuditLog, AuditStats};
pub use authorizer::{AllowAll, AuditedAuthorizer, Authorizer, RolePolicy};
pub use verdict::Verdict;

use report_core::{Action, ReportError, RequestContext};

/// Ask the authorizer and turn a denial into `NotAuthorized`.
pub fn require(
    authorizer: &dyn Authorizer,
    action: Action,
    ctx: &RequestContext,
) -> Result<(), ReportError> {
    match authorizer.authorize(action, ctx) {
        Verdict::Allow => Ok(()),
        Verdict::Deny { reason } => {
            tracing::info!(
                user = %ctx.user_label(),
                report = ctx.report.as_deref().unwrap_or("-"),
                action = %action,
                reason = %reason,
                "authorization denied"
            );
            Err(ReportError::NotAuthorized(action))
        }
    }
}

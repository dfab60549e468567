//! Authorizers: the decision point consulted before each side effect or read
use report_core::{Action, RequestContext};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use crate::audit::{AuditEntry, AuditLog};
use crate::verdict::Verdict;

pub trait Authorizer: Send + Sync {
    fn authorize(&self, action: Action, ctx: &RequestContext) -> Verdict;
}

/// Permits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _action: Action, _ctx: &RequestContext) -> Verdict {
        Verdict::allow()
    }
}

/// Everyone may list, view and read; only administrators may refresh.
/// Individual reports can be restricted to named users (administrators
/// always pass).
#[derive(Debug, Clone, Default)]
pub struct RolePolicy {
    admins: HashSet<String>,
    restricted: HashMap<String, HashSet<String>>,
}

impl RolePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant one user administrator rights.
    pub fn with_admin(mut self, user: impl Into<String>) -> Self {
        self.admins.insert(user.into());
        self
    }

    /// Grant administrator rights to every user in `users`.
    pub fn with_admins<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.admins.extend(users.into_iter().map(Into::into));
        self
    }

    /// Limit one report to `users`. Everyone else is denied every action on
    /// it, including viewing. Restricting a report again replaces its list.
    pub fn restrict<I, S>(mut self, report: impl Into<String>, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.restricted
            .insert(report.into(), users.into_iter().map(Into::into).collect());
        self
    }

    fn is_admin(&self, ctx: &RequestContext) -> bool {
        ctx.user
            .as_ref()
            .map(|user| self.admins.contains(user))
            .unwrap_or(false)
    }
}

impl Authorizer for RolePolicy {
    fn authorize(&self, action: Action, ctx: &RequestContext) -> Verdict {
        if self.is_admin(ctx) {
            return Verdict::allow();
        }

        if action == Action::Refresh {
            return Verdict::deny("refresh requires an administrator");
        }

        let allowed_users = ctx
            .report
            .as_ref()
            .and_then(|report| self.restricted.get(report));
        match (allowed_users, ctx.user.as_ref()) {
            (None, _) => Verdict::allow(),
            (Some(users), Some(user)) if users.contains(user) => Verdict::allow(),
            (Some(_), _) => Verdict::deny("report is restricted"),
        }
    }
}

/// Records every decision of the wrapped authorizer.
pub struct AuditedAuthorizer<A> {
    inner: A,
    log: Arc<Mutex<AuditLog>>,
}

impl<A: Authorizer> AuditedAuthorizer<A> {
    pub fn new(inner: A, log: Arc<Mutex<AuditLog>>) -> Self {
        Self { inner, log }
    }

    /// Shared handle to the log the decisions are written to.
    pub fn log(&self) -> Arc<Mutex<AuditLog>> {
        Arc::clone(&self.log)
    }
}

impl<A: Authorizer> Authorizer for AuditedAuthorizer<A> {
    fn authorize(&self, action: Action, ctx: &RequestContext) -> Verdict {
        let verdict = self.inner.authorize(action, ctx);
        let entry = AuditEntry::record(action, ctx, &verdict);
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .log(entry);
        verdict
    }
}

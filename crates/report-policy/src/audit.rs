//! Audit trail of authorization decisions
use chrono::{DateTime, Utc};
use report_core::{Action, RequestContext};
use serde::{Deserialize, Serialize};

use crate::verdict::Verdict;

/// One authorization decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// `aud_` followed by a uuid
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub action: Action,
    /// Unset for anonymous requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    /// Organization path segment of the request, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// Trace id of the request that triggered the decision
    pub trace_id: String,
    pub verdict: Verdict,
}

impl AuditEntry {
    pub fn record(action: Action, ctx: &RequestContext, verdict: &Verdict) -> Self {
        Self {
            id: format!("aud_{}", uuid::Uuid::new_v4().simple()),
            timestamp: Utc::now(),
            action,
            user: ctx.user.clone(),
            report: ctx.report.clone(),
            organization: ctx.organization.clone(),
            trace_id: ctx.trace_id.clone(),
            verdict: verdict.clone(),
        }
    }
}

/// Bounded log; the oldest entries are dropped first.
pub struct AuditLog {
    entries: Vec<AuditEntry>,
    max_entries: usize,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_max_entries(10000)
    }

    pub fn with_max_entries(max: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries: max,
        }
    }

    /// Append an entry, dropping the oldest past the bound.
    pub fn log(&mut self, entry: AuditEntry) {
        self.entries.push(entry);

        if self.entries.len() > self.max_entries {
            let drain_count = self.entries.len() - self.max_entries;
            self.entries.drain(0..drain_count);
        }
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    /// Entries for one report id.
    pub fn entries_for_report(&self, report: &str) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .filter(|e| e.report.as_deref() == Some(report))
            .collect()
    }

    /// Entries whose verdict was a denial.
    pub fn denied_entries(&self) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .filter(|e| !e.verdict.is_allowed())
            .collect()
    }

    /// Export to JSON Lines
    pub fn to_jsonl(&self) -> String {
        self.entries
            .iter()
            .filter_map(|e| serde_json::to_string(e).ok())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn stats(&self) -> AuditStats {
        let total = self.entries.len();
        let allowed = self.entries.iter().filter(|e| e.verdict.is_allowed()).count();
        let denied = total - allowed;
        let refreshes = self
            .entries
            .iter()
            .filter(|e| e.action == Action::Refresh)
            .count();

        AuditStats {
            total,
            allowed,
            denied,
            refreshes,
            deny_rate: if total > 0 { denied as f64 / total as f64 } else { 0.0 },
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditStats {
    pub total: usize,
    pub allowed: usize,
    pub denied: usize,
    pub refreshes: usize,
    pub deny_rate: f64,
}

//! Pre-render normalization for the data formats.
use once_cell::sync::Lazy;
use report_core::{Cell, ReportData, Row, Table};
use std::collections::HashSet;

/// Column labels treated as user identities, compared lowercase.
pub static IDENTITY_COLUMNS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["user", "username", "user_name", "author", "created_by"]
        .into_iter()
        .collect()
});

/// Replaces a user-identifying value with an opaque one.
pub trait Anonymizer: Send + Sync {
    fn redact(&self, value: &Cell, organization: Option<&str>) -> Cell;
}

/// `user-<10 hex chars of blake3(organization|value)>`. Stable for the
/// same user within an organization, unlinkable across organizations.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashingAnonymizer;

impl Anonymizer for HashingAnonymizer {
    fn redact(&self, value: &Cell, organization: Option<&str>) -> Cell {
        let text = match value {
            Cell::Null => return Cell::Null,
            Cell::Text(s) => s.clone(),
            other => serde_json::to_string(other).unwrap_or_default(),
        };
        let mut hasher = blake3::Hasher::new();
        hasher.update(organization.unwrap_or_default().as_bytes());
        hasher.update(b"|");
        hasher.update(text.as_bytes());
        let digest = hasher.finalize().to_hex();
        Cell::Text(format!("user-{}", &digest.as_str()[..10]))
    }
}

/// Turn positional rows into named rows using the parallel column list.
/// Short rows yield only the columns they have.
pub fn ensure_records(data: &mut ReportData) {
    if let Table::Positional { columns, rows } = &mut data.table {
        let records = rows
            .drain(..)
            .map(|values| {
                columns
                    .iter()
                    .cloned()
                    .zip(values)
                    .collect::<Row>()
            })
            .collect();
        data.table = Table::Records(records);
    }
}

/// Redact identity columns in place. A no-op without an anonymizer.
pub fn redact_identities(
    data: &mut ReportData,
    anonymizer: Option<&dyn Anonymizer>,
    organization: Option<&str>,
) {
    let Some(anonymizer) = anonymizer else {
        return;
    };
    let Table::Records(rows) = &mut data.table else {
        return;
    };
    for row in rows.iter_mut() {
        for (column, cell) in row.iter_mut() {
            if IDENTITY_COLUMNS.contains(column.to_ascii_lowercase().as_str()) {
                *cell = anonymizer.redact(cell, organization);
            }
        }
    }
}

//! Fixture generator: serves rows declared inline in the catalogue
use report_core::{Cell, GenerationError, Generator, OptionSet, ReportData, Row, ORGANIZATION_OPTION};

/// Returns its rows unchanged, narrowed to the requested organization when
/// one is set.
#[derive(Debug, Clone, Default)]
pub struct FixtureGenerator {
    rows: Vec<Row>,
}

impl FixtureGenerator {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }
}

impl Generator for FixtureGenerator {
    fn generate(&self, _report_id: &str, options: &OptionSet) -> Result<ReportData, GenerationError> {
        if let Some(value) = options.get(ORGANIZATION_OPTION) {
            if !(value.is_null() || value.is_string()) {
                return Err(GenerationError::BadOption(ORGANIZATION_OPTION.to_string()));
            }
        }

        let rows: Vec<Row> = match options.organization() {
            Some(org) => self
                .rows
                .iter()
                .filter(|row| row.get(ORGANIZATION_OPTION).and_then(Cell::as_str) == Some(org))
                .cloned()
                .collect(),
            None => self.rows.clone(),
        };
        let total = rows.len();
        Ok(ReportData::records(rows).with_extra("total", total.into()))
    }
}

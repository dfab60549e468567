//! CSV encoding of named rows.
//!
//! Header is the union of all row columns in first-seen order. Every field
//! is coerced to text and quoted. Lines end with `\r\n`.

use chrono::{DateTime, Utc};
use report_core::{Cell, ReportError, Row};
use std::collections::HashSet;
use std::io::{self, Write};
use thiserror::Error;

/// Written for a column a row does not have.
pub const MISSING_CELL: &str = "no record";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to write csv header: {0}")]
    Header(io::Error),

    /// Names the offending row and its coerced values.
    #[error("{reason}: {row}, {values:?}")]
    Row {
        reason: String,
        row: String,
        values: Vec<String>,
    },
}

impl From<CsvError> for ReportError {
    fn from(err: CsvError) -> Self {
        ReportError::Render(err.to_string())
    }
}

/// Union of row columns in first-seen order.
pub fn header_order(rows: &[Row]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut header = Vec::new();
    for row in rows {
        for column in row.columns() {
            if seen.insert(column) {
                header.push(column.to_string());
            }
        }
    }
    header
}

/// Text form of a single cell.
pub fn coerce(cell: Option<&Cell>) -> Result<String, serde_json::Error> {
    Ok(match cell {
        None => MISSING_CELL.to_string(),
        Some(Cell::Null) => String::new(),
        Some(Cell::Timestamp(ts)) => format_timestamp(ts),
        Some(Cell::Text(text)) => text.clone(),
        Some(Cell::Int(n)) => n.to_string(),
        Some(Cell::Float(n)) => n.to_string(),
        Some(Cell::Bool(flag)) => flag.to_string(),
        Some(list @ Cell::List(_)) => serde_json::to_string(list)?,
    })
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Write the header and every row to `out`.
pub fn write_csv<W: Write>(rows: &[Row], mut out: W) -> Result<(), CsvError> {
    let header = header_order(rows);
    write_record(&mut out, &header).map_err(CsvError::Header)?;

    for row in rows {
        let mut values = Vec::with_capacity(header.len());
        let mut failure = None;
        for column in &header {
            match coerce(row.get(column)) {
                Ok(value) => values.push(value),
                Err(err) => {
                    failure = Some(err.to_string());
                    break;
                }
            }
        }
        let result = match failure {
            Some(reason) => Err(reason),
            None => write_record(&mut out, &values).map_err(|e| e.to_string()),
        };
        if let Err(reason) = result {
            return Err(CsvError::Row {
                reason,
                row: serde_json::to_string(row).unwrap_or_default(),
                values,
            });
        }
    }
    out.flush().map_err(CsvError::Header)
}

/// Encode into a buffer. Nothing is returned on failure.
pub fn render_csv(rows: &[Row]) -> Result<Vec<u8>, CsvError> {
    let mut buffer = Vec::new();
    write_csv(rows, &mut buffer)?;
    Ok(buffer)
}

fn write_record<W: Write>(out: &mut W, fields: &[String]) -> io::Result<()> {
    let line = fields
        .iter()
        .map(|field| format!("\"{}\"", field.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(",");
    out.write_all(line.as_bytes())?;
    out.write_all(b"\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rendered(rows: &[Row]) -> String {
        String::from_utf8(render_csv(rows).unwrap()).unwrap()
    }

    #[test]
    fn test_union_header_and_missing_cells() {
        let rows = vec![
            Row::new().with("a", 1).with("b", "x"),
            Row::new().with("c", 2),
        ];
        assert_eq!(
            rendered(&rows),
            "\"a\",\"b\",\"c\"\r\n\"1\",\"x\",\"no record\"\r\n\"no record\",\"no record\",\"2\"\r\n"
        );
    }

    #[test]
    fn test_value_coercion() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 42).unwrap();
        let rows = vec![Row::new()
            .with("when", ts)
            .with("missing", Cell::Null)
            .with("tags", vec![Cell::from("a"), Cell::from("b")])
            .with("ratio", 0.5)
            .with("ok", true)];
        assert_eq!(
            rendered(&rows),
            "\"when\",\"missing\",\"tags\",\"ratio\",\"ok\"\r\n\
             \"2024-03-01 09:05\",\"\",\"[\"\"a\"\",\"\"b\"\"]\",\"0.5\",\"true\"\r\n"
        );
    }

    #[test]
    fn test_quotes_are_doubled() {
        let rows = vec![Row::new().with("title", "say \"hi\", ok")];
        assert_eq!(
            rendered(&rows),
            "\"title\"\r\n\"say \"\"hi\"\", ok\"\r\n"
        );
    }

    #[test]
    fn test_empty_rows_give_empty_header() {
        assert_eq!(rendered(&[]), "\r\n");
    }

    /// Accepts `limit` bytes, then fails.
    struct FailingWriter {
        written: usize,
        limit: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written + buf.len() > self.limit {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.written += buf.len();
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_row_failure_names_row_and_values() {
        let rows = vec![Row::new().with("name", "river-levels")];
        let header_len = "\"name\"\r\n".len();
        let err = write_csv(
            &rows,
            FailingWriter {
                written: 0,
                limit: header_len,
            },
        )
        .unwrap_err();

        match &err {
            CsvError::Row { reason, row, values } => {
                assert_eq!(reason, "disk full");
                assert_eq!(row, r#"{"name":"river-levels"}"#);
                assert_eq!(values, &vec!["river-levels".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("river-levels"));
    }
}

//! Data Model: Cell, Row, Table, ReportData, CachedArtifact
use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

use crate::cache_key::CacheKey;

/// A single value in a report row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// RFC 3339 strings deserialize into this variant before `Text`.
    Timestamp(DateTime<Utc>),
    Text(String),
    List(Vec<Cell>),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::Int(i64::from(value))
    }
}

impl From<usize> for Cell {
    fn from(value: usize) -> Self {
        i64::try_from(value)
            .map(Cell::Int)
            .unwrap_or(Cell::Float(value as f64))
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl From<DateTime<Utc>> for Cell {
    fn from(value: DateTime<Utc>) -> Self {
        Cell::Timestamp(value)
    }
}

impl From<Vec<Cell>> for Cell {
    fn from(value: Vec<Cell>) -> Self {
        Cell::List(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}

/// One row of a table, keeping columns in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(Vec<(String, Cell)>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Cell>) -> Self {
        self.insert(column, value);
        self
    }

    /// Insert or replace a column. A replaced column keeps its position.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Cell>) {
        let column = column.into();
        let value = value.into();
        match self.0.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.0
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Cell)> {
        self.0.iter_mut().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Cell)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Cell)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.insert(column, value);
        }
        row
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = Row;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of column name to value")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Row, A::Error> {
                let mut row = Row::new();
                while let Some((column, value)) = access.next_entry::<String, Cell>()? {
                    row.insert(column, value);
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

/// Raw rows as produced by a generator.
#[derive(Debug, Clone, PartialEq)]
pub enum Table {
    /// Rows already keyed by column name
    Records(Vec<Row>),
    /// Positional rows with a parallel column-name sequence
    Positional {
        columns: Vec<String>,
        rows: Vec<Vec<Cell>>,
    },
}

impl Table {
    pub fn len(&self) -> usize {
        match self {
            Table::Records(rows) => rows.len(),
            Table::Positional { rows, .. } => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> Option<&[Row]> {
        match self {
            Table::Records(rows) => Some(rows),
            Table::Positional { .. } => None,
        }
    }
}

/// The structured result of one report computation: the table plus any
/// report-specific summary fields (totals, notes).
#[derive(Debug, Clone, PartialEq)]
pub struct ReportData {
    pub table: Table,
    pub extras: Map<String, Value>,
}

impl ReportData {
    pub fn records(rows: Vec<Row>) -> Self {
        Self {
            table: Table::Records(rows),
            extras: Map::new(),
        }
    }

    pub fn positional(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            table: Table::Positional { columns, rows },
            extras: Map::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extras.insert(key.into(), value);
        self
    }

    pub fn has_results(&self) -> bool {
        !self.table.is_empty()
    }
}

impl Serialize for ReportData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match &self.table {
            Table::Records(rows) => map.serialize_entry("table", rows)?,
            Table::Positional { columns, rows } => {
                map.serialize_entry("table", rows)?;
                map.serialize_entry("columns", columns)?;
            }
        }
        for (key, value) in &self.extras {
            if key == "table" || key == "columns" {
                continue;
            }
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A generated artifact as held by the cache store.
#[derive(Debug, Clone)]
pub struct CachedArtifact {
    pub key: CacheKey,
    pub data: ReportData,
    pub generated_at: DateTime<Utc>,
}

//! Tabular query results shared by the dispatcher, the response generator,
//! and the visualization client.
//!
//! Every row carries exactly the keys listed in `columns`; missing data is an
//! explicit `null`. The constructor, `push_row`, and deserialization all
//! enforce this, so consumers may index rows by column name unchecked.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ClinicianError, Result};

/// A scalar cell value. Nested structures are not representable.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(n) => Some(*n as f64),
            CellValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => f.write_str("—"),
            CellValue::Integer(n) => write!(f, "{}", n),
            CellValue::Float(x) => write!(f, "{}", x),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<u32> for CellValue {
    fn from(value: u32) -> Self {
        CellValue::Integer(i64::from(value))
    }
}

impl From<u64> for CellValue {
    fn from(value: u64) -> Self {
        i64::try_from(value)
            .map(CellValue::Integer)
            .unwrap_or(CellValue::Float(value as f64))
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Text(if value { "yes" } else { "no" }.to_string())
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Null)
    }
}

/// One result row keyed by column name.
pub type Row = BTreeMap<String, CellValue>;

/// Execution details attached to a result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    /// Milliseconds spent in the handler, including the store lookup.
    #[serde(
        default,
        rename = "executionTime",
        skip_serializing_if = "Option::is_none"
    )]
    pub execution_time_ms: Option<u64>,
}

/// Column-ordered tabular result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawQueryResult")]
pub struct QueryResult {
    columns: Vec<String>,
    rows: Vec<Row>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<ResultMetadata>,
}

/// Unvalidated wire form, checked by `TryFrom`.
#[derive(Deserialize)]
struct RawQueryResult {
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Row>,
    #[serde(default)]
    metadata: Option<ResultMetadata>,
}

impl TryFrom<RawQueryResult> for QueryResult {
    type Error = ClinicianError;

    fn try_from(raw: RawQueryResult) -> Result<Self> {
        let mut result = QueryResult::new(raw.columns)?;
        for row in raw.rows {
            result.push_row(row)?;
        }
        result.metadata = raw.metadata;
        Ok(result)
    }
}

impl QueryResult {
    /// Create an empty result. Column names must be unique.
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(ClinicianError::InvalidResult(format!(
                    "duplicate column '{}'",
                    column
                )));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
            metadata: None,
        })
    }

    /// Append a row. Unlisted columns are rejected; absent columns become `null`.
    pub fn push_row<I, K>(&mut self, cells: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, CellValue)>,
        K: Into<String>,
    {
        let mut row: Row = self
            .columns
            .iter()
            .map(|c| (c.clone(), CellValue::Null))
            .collect();
        for (key, value) in cells {
            let key = key.into();
            match row.get_mut(&key) {
                Some(slot) => *slot = value,
                None => {
                    return Err(ClinicianError::InvalidResult(format!(
                        "unknown column '{}'",
                        key
                    )))
                }
            }
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at `row`/`column`, if both exist.
    pub fn value(&self, row: usize, column: &str) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    pub fn metadata(&self) -> Option<&ResultMetadata> {
        self.metadata.as_ref()
    }

    pub fn set_metadata(&mut self, metadata: ResultMetadata) {
        self.metadata = Some(metadata);
    }

    /// Drop rows beyond `max`.
    pub fn truncate(&mut self, max: usize) {
        self.rows.truncate(max);
    }

    /// Verify the column-completeness invariant.
    pub fn check_columns(&self) -> Result<()> {
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != self.columns.len()
                || !self.columns.iter().all(|c| row.contains_key(c))
            {
                return Err(ClinicianError::InvalidResult(format!(
                    "row {} does not match columns",
                    i
                )));
            }
        }
        Ok(())
    }
}

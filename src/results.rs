//! Decoder for `analysis_result.txt`, the per-well analysis table.
//!
//! Each data row becomes a [`ResultRow`] keyed by the header active at that
//! point, with header names kept verbatim. Malformed rows are skipped, never
//! reported.
//!
//! # Examples
//! ```
//! let rows = edskit::results::parse_results("Well\tCt\n3\t25.1\nbad\tx\n7\t30.2\n").unwrap();
//! assert_eq!(rows.len(), 2);
//! assert_eq!(rows[1].get("Ct"), Some("30.2"));
//! ```
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::Result;
use crate::table::{scan, Row};
use crate::well::WellIndex;

/// One analysis-result row.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ResultRow {
    /// Well index read from the first field.
    pub well: WellIndex,
    values: Vec<(String, String)>,
}

impl ResultRow {
    /// Pair `fields` with `header` by position. Fields past the header are
    /// dropped and header columns past the fields are absent; a repeated column
    /// name keeps its first position and its last value.
    pub fn from_fields(well: WellIndex, header: &[String], fields: &[String]) -> Self {
        let mut row = ResultRow { well, values: Vec::with_capacity(header.len()) };
        for (column, value) in header.iter().zip(fields) {
            match row.values.iter_mut().find(|(c, _)| c == column) {
                Some(slot) => slot.1 = value.clone(),
                None => row.values.push((column.clone(), value.clone())),
            }
        }
        row
    }

    /// Value of `column`, if the row had a field for it.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.iter().find(|(c, _)| c == column).map(|(_, v)| v.as_str())
    }

    /// Column/value pairs in header order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }

    /// Number of columns with a value.
    pub fn len(&self) -> usize { self.values.len() }

    pub fn is_empty(&self) -> bool { self.values.is_empty() }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(self.values.len()))?;
        for (column, value) in &self.values {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Decode the result table.
///
/// # Errors
/// Only reader failures ([`crate::EdsError::Table`]); bad rows are dropped.
pub fn parse_results(text: &str) -> Result<Vec<ResultRow>> {
    let mut header: Vec<String> = Vec::new();
    let mut rows = Vec::new();
    for row in scan(text)? {
        match row {
            Row::Header(fields) => header = fields,
            Row::Data { index, fields } => rows.push(ResultRow::from_fields(index, &header, &fields)),
        }
    }
    Ok(rows)
}

/// Every column that occurs in `rows`, in first-seen order.
pub fn columns(rows: &[ResultRow]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for (column, _) in rows.iter().flat_map(ResultRow::values) {
        if !out.iter().any(|c| c == column) {
            out.push(column.to_string());
        }
    }
    out
}

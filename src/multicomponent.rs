//! Decoder for `multicomponent_data.txt`, the raw per-cycle fluorescence table.
//!
//! The result is keyed well name → dye → cycle, with wells in the order they
//! first appear in the table. Rows use the same scanning
//! rules as the result table; header names are normalized
//! (`"Well Position"` → `"well_position"`).
//!
//! Some exports prepend extra numeric triplets before the dye column. While the
//! third field is non-empty and has no letter in it, the first three fields are
//! dropped; after that the row reads `well, cycle, dye, _, value`.
use std::collections::BTreeMap;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use tracing::trace;

use crate::error::Result;
use crate::table::{scan, Row};
use crate::well::PlateGeometry;

static FIRST_WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

/// Minimum number of fields in a usable data row.
pub const MIN_FIELDS: usize = 5;

/// Cycle → fluorescence reading, as written in the table.
pub type CycleSeries = BTreeMap<u32, String>;

/// Readings of one table. Serializes as the well map alone.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MultiComponentSeries {
    /// Well name → dye → cycle series, wells in first-appearance order.
    pub wells: IndexMap<String, BTreeMap<String, CycleSeries>>,
    /// Normalized header active when the table ended.
    #[serde(skip)]
    pub columns: Vec<String>,
}

impl MultiComponentSeries {
    /// The reading of `well` for `dye` at `cycle`, as written in the table.
    pub fn get(&self, well: &str, dye: &str, cycle: u32) -> Option<&str> {
        self.series(well, dye)?.get(&cycle).map(String::as_str)
    }

    /// The whole cycle series of `well` for `dye`.
    pub fn series(&self, well: &str, dye: &str) -> Option<&CycleSeries> { self.wells.get(well)?.get(dye) }

    /// Dyes read in `well`, sorted by name.
    pub fn dyes(&self, well: &str) -> impl Iterator<Item = &str> {
        self.wells.get(well).into_iter().flat_map(|dyes| dyes.keys().map(String::as_str))
    }

    pub fn well_names(&self) -> impl Iterator<Item = &str> { self.wells.keys().map(String::as_str) }
}

/// Trim, lowercase, and turn the first internal whitespace run into `_`.
pub fn normalize_header(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    FIRST_WHITESPACE_RUN.replacen(&lower, 1, "_").into_owned()
}

/// Shift misaligned rows left by three fields until the third field names a dye.
pub(crate) fn align(mut fields: Vec<String>) -> Vec<String> {
    while fields.get(2).is_some_and(|f| !f.is_empty() && !f.bytes().any(|b| b.is_ascii_alphabetic())) {
        fields.drain(..3);
    }
    fields
}

/// Decode the multicomponent table for a plate of the given geometry.
///
/// # Errors
/// Reader failures, and [`crate::EdsError::RowOutOfRange`] for a well index
/// beyond the plate's row letters.
///
/// # Examples
/// ```
/// use edskit::multicomponent::parse_multicomponent;
/// use edskit::PlateGeometry;
/// let text = "Well\tCycle\tDye\tFAM\tVIC\n0\t1\tFAM\t-\t1234.5\n0\t1\t5\t0\t2\tFAM\t-\t1250.0\n";
/// let series = parse_multicomponent(text, PlateGeometry::PLATE_96).unwrap();
/// assert_eq!(series.get("A1", "FAM", 1), Some("1234.5"));
/// assert_eq!(series.get("A1", "FAM", 2), Some("1250.0"));
/// ```
pub fn parse_multicomponent(text: &str, geometry: PlateGeometry) -> Result<MultiComponentSeries> {
    let mut out = MultiComponentSeries::default();
    for row in scan(text)? {
        let (index, fields) = match row {
            Row::Header(fields) => {
                out.columns = fields.iter().map(|f| if f.is_empty() { f.clone() } else { normalize_header(f) }).collect();
                continue;
            }
            Row::Data { index, fields } => (index, fields),
        };
        if fields.len() < MIN_FIELDS {
            trace!(index, fields = fields.len(), "skipping short multicomponent row");
            continue;
        }
        let well = geometry.well_index_to_name(index)?;
        let dyes = out.wells.entry(well).or_default();

        let fields = align(fields);
        let Some(dye) = fields.get(2).filter(|d| !d.is_empty()) else { continue };
        let Some(cycle) = fields.get(1).and_then(|c| c.trim().parse::<u32>().ok()) else {
            trace!(index, cycle = ?fields.get(1), "skipping row with a non-integer cycle");
            continue;
        };
        let Some(value) = fields.get(4) else { continue };
        dyes.entry(dye.clone()).or_default().insert(cycle, value.clone());
    }
    Ok(out)
}

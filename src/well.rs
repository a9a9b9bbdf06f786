//! Well-coordinate arithmetic for multi-well plates.
//!
//! A well is addressed either by **name** (`"A1"` .. `"H12"`, row letter plus
//! one-based column) or by zero-based **linear index** (`row * cols + col`).
//! Every builder and parser in this crate goes through these functions, so the
//! mapping is the single source of truth for where a sample ends up.
//!
//! Plate dimensions are explicit configuration ([`PlateGeometry`]); the free
//! functions use [`PlateGeometry::PLATE_96`].
//!
//! # Examples
//! ```
//! use edskit::well::{well_to_index, well_index_to_name};
//! assert_eq!(well_to_index("C4").unwrap(), 27);
//! assert_eq!(well_index_to_name(95).unwrap(), "H12");
//! ```
use crate::error::{EdsError, Result};

/// Zero-based linear well position.
pub type WellIndex = usize;

/// Row/column dimensions of a plate.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct PlateGeometry {
    pub rows: usize,
    pub cols: usize,
}

impl Default for PlateGeometry {
    fn default() -> Self { Self::PLATE_96 }
}

impl PlateGeometry {
    /// The 8×12 layout used by every supported instrument.
    pub const PLATE_96: PlateGeometry = PlateGeometry { rows: 8, cols: 12 };

    /// Number of wells on the plate.
    pub fn well_count(&self) -> usize { self.rows * self.cols }

    /// Map a row letter (case-insensitive) to its zero-based row number.
    ///
    /// # Errors
    /// [`EdsError::InvalidWellRow`] if the letter is not one of the plate's rows.
    pub fn well_row_to_number(&self, letter: char) -> Result<usize> {
        let upper = letter.to_ascii_uppercase();
        let offset = (upper as i64) - ('A' as i64);
        if offset < 0 || offset >= self.rows as i64 {
            return Err(EdsError::InvalidWellRow(upper.to_string()));
        }
        Ok(offset as usize)
    }

    /// Map a zero-based row number to its letter.
    ///
    /// The bound is the **column** count, not the row count: on a 96-well plate
    /// rows 8..=11 map to `'I'..='L'`.
    ///
    /// # Errors
    /// [`EdsError::RowOutOfRange`] if `row >= cols`.
    pub fn well_row_to_letter(&self, row: usize) -> Result<char> {
        if row >= self.cols {
            return Err(EdsError::RowOutOfRange { row, limit: self.cols });
        }
        u8::try_from(row)
            .ok()
            .and_then(|r| b'A'.checked_add(r))
            .map(char::from)
            .ok_or(EdsError::RowOutOfRange { row, limit: self.cols })
    }

    /// Convert a well name like `"c4"` or `"H12"` to its linear index.
    ///
    /// The column is read the way the table decoders read integers: the leading
    /// digits after the row letter.
    ///
    /// # Errors
    /// * [`EdsError::InvalidWellName`] if the name is not 2 or 3 characters long.
    /// * [`EdsError::InvalidWellRow`] for an unknown row letter.
    /// * [`EdsError::InvalidColumn`] if the column is missing or outside `1..=cols`.
    pub fn well_to_index(&self, name: &str) -> Result<WellIndex> {
        let len = name.chars().count();
        if !(2..=3).contains(&len) {
            return Err(EdsError::InvalidWellName(name.to_string()));
        }
        let mut chars = name.chars();
        let letter = chars.next().ok_or_else(|| EdsError::InvalidWellName(name.to_string()))?;
        let row = self.well_row_to_number(letter)?;
        let column_text = chars.as_str();
        let invalid_column = || EdsError::InvalidColumn { well: name.to_string(), column: column_text.to_string() };
        let column = leading_integer(column_text).ok_or_else(invalid_column)?;
        if column < 1 || column > self.cols as i64 {
            return Err(invalid_column());
        }
        Ok(row * self.cols + (column as usize - 1))
    }

    /// Convert a linear index back to its canonical well name.
    ///
    /// No range check is applied to `index` itself; only the derived row letter is
    /// validated by [`PlateGeometry::well_row_to_letter`].
    pub fn well_index_to_name(&self, index: WellIndex) -> Result<String> {
        let col = index % self.cols + 1;
        let row = index / self.cols;
        Ok(format!("{}{}", self.well_row_to_letter(row)?, col))
    }
}

/// [`PlateGeometry::well_row_to_number`] on a 96-well plate.
pub fn well_row_to_number(letter: char) -> Result<usize> { PlateGeometry::PLATE_96.well_row_to_number(letter) }

/// [`PlateGeometry::well_row_to_letter`] on a 96-well plate.
pub fn well_row_to_letter(row: usize) -> Result<char> { PlateGeometry::PLATE_96.well_row_to_letter(row) }

/// [`PlateGeometry::well_to_index`] on a 96-well plate.
pub fn well_to_index(name: &str) -> Result<WellIndex> { PlateGeometry::PLATE_96.well_to_index(name) }

/// [`PlateGeometry::well_index_to_name`] on a 96-well plate.
pub fn well_index_to_name(index: WellIndex) -> Result<String> { PlateGeometry::PLATE_96.well_index_to_name(index) }

/// Lenient integer prefix: skips leading whitespace, accepts one sign, then
/// reads digits up to the first non-digit. `None` when no digit follows.
/// Magnitudes beyond `i64` saturate, keeping the sign.
///
/// `"7"`, `" 7 "`, `"7abc"` all read as `7`; `"-1"` reads as `-1`; `"abc"` is `None`.
pub(crate) fn leading_integer(text: &str) -> Option<i64> {
    let s = text.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits.bytes().take_while(u8::is_ascii_digit).count();
    if end == 0 { return None; }
    let value = digits[..end].bytes().fold(0i64, |acc, b| {
        let digit = i64::from(b - b'0');
        let acc = acc.saturating_mul(10);
        if negative { acc.saturating_sub(digit) } else { acc.saturating_add(digit) }
    });
    Some(value)
}

#[cfg(test)]
mod well_tests {
    use super::*;

    #[test]
    fn known_wells_map_to_expected_indices() {
        assert_eq!(well_to_index("A1").unwrap(), 0);
        assert_eq!(well_to_index("C4").unwrap(), 27);
        assert_eq!(well_to_index("H11").unwrap(), 94);
        assert_eq!(well_to_index("H12").unwrap(), 95);
        assert_eq!(well_to_index("h12").unwrap(), 95);
    }

    #[test]
    fn every_index_round_trips_through_its_name() {
        for i in 0..PlateGeometry::PLATE_96.well_count() {
            let name = well_index_to_name(i).unwrap();
            assert_eq!(well_to_index(&name).unwrap(), i, "index {i} via {name}");
        }
    }

    #[test]
    fn names_canonicalize_to_uppercase_without_leading_zero() {
        for name in ["a1", "b07", "d10", "G12"] {
            let i = well_to_index(name).unwrap();
            let canon = well_index_to_name(i).unwrap();
            let letter = name.chars().next().unwrap().to_ascii_uppercase();
            let col: usize = name[1..].parse().unwrap();
            assert_eq!(canon, format!("{letter}{col}"));
        }
    }

    #[test]
    fn row_letter_bound_uses_column_count() {
        for row in 8..12 {
            assert!(well_row_to_letter(row).is_ok(), "row {row} should map to a letter");
        }
        assert_eq!(well_row_to_letter(11).unwrap(), 'L');
        assert!(matches!(well_row_to_letter(12), Err(EdsError::RowOutOfRange { row: 12, limit: 12 })));
    }

    #[test]
    fn rejects_malformed_names() {
        assert!(matches!(well_to_index("A"), Err(EdsError::InvalidWellName(_))));
        assert!(matches!(well_to_index("A100"), Err(EdsError::InvalidWellName(_))));
        assert!(matches!(well_to_index("I1"), Err(EdsError::InvalidWellRow(_))));
        assert!(matches!(well_to_index("@1"), Err(EdsError::InvalidWellRow(_))));
        assert!(matches!(well_to_index("A0"), Err(EdsError::InvalidColumn { .. })));
        assert!(matches!(well_to_index("A13"), Err(EdsError::InvalidColumn { .. })));
        assert!(matches!(well_to_index("AB"), Err(EdsError::InvalidColumn { .. })));
    }

    #[test]
    fn geometry_is_threaded_through() {
        let g = PlateGeometry { rows: 16, cols: 24 };
        assert_eq!(g.well_to_index("P24").unwrap(), 383);
        assert_eq!(g.well_index_to_name(383).unwrap(), "P24");
    }

    #[test]
    fn leading_integer_matches_lenient_prefix_rules() {
        assert_eq!(leading_integer("12"), Some(12));
        assert_eq!(leading_integer("  3\t"), Some(3));
        assert_eq!(leading_integer("7x"), Some(7));
        assert_eq!(leading_integer("-4"), Some(-4));
        assert_eq!(leading_integer("+5"), Some(5));
        assert_eq!(leading_integer("bad"), None);
        assert_eq!(leading_integer(""), None);
        assert_eq!(leading_integer("-"), None);
        assert_eq!(leading_integer("99999999999999999999"), Some(i64::MAX));
        assert_eq!(leading_integer("-99999999999999999999x"), Some(i64::MIN));
    }
}

//! Row scanning shared by the tab-delimited table decoders.
//!
//! Instrument exports prefix the data with free-form preamble lines and may
//! repeat the header. The scanner reads every line as tab-separated fields
//! (no quoting, any width) and classifies it:
//!
//! * a line whose first field is empty is dropped;
//! * a line whose first field is `Well` (any case, surrounding blanks allowed)
//!   is a header and replaces the previous one;
//! * before the first header every other line is preamble and dropped;
//! * after it, a line is data when its first field starts with a
//!   non-negative integer, the well index. Anything else is dropped.
use tracing::trace;

use crate::error::Result;
use crate::well::{leading_integer, WellIndex};

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Row {
    Header(Vec<String>),
    Data { index: WellIndex, fields: Vec<String> },
}

pub(crate) fn is_header(first: &str) -> bool { first.trim().eq_ignore_ascii_case("well") }

/// Leading integer of the first field when it is a valid (non-negative) index.
pub(crate) fn row_index(first: &str) -> Option<WellIndex> {
    leading_integer(first).and_then(|i| WellIndex::try_from(i).ok())
}

pub(crate) fn scan(text: &str) -> Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    let mut seen_header = false;
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let fields: Vec<String> = record.iter().map(String::from).collect();
        let Some(first) = fields.first().filter(|f| !f.is_empty()) else { continue };
        if is_header(first) {
            seen_header = true;
            rows.push(Row::Header(fields));
            continue;
        }
        if !seen_header {
            continue;
        }
        match row_index(first) {
            Some(index) => rows.push(Row::Data { index, fields }),
            None => trace!(line, first = %first, "skipping row without a well index"),
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod table_tests {
    use super::*;

    #[test]
    fn classifies_preamble_headers_and_data() {
        let text = "* Block Type = 96\n3\tpreamble\nWell\tCt\n\n3\t25.1\r\nbad\tx\n\t7\n WELL \tCT\n-1\tx\n7abc\t30.2\n";
        let rows = scan(text).unwrap();
        assert_eq!(
            rows,
            vec![
                Row::Header(vec!["Well".into(), "Ct".into()]),
                Row::Data { index: 3, fields: vec!["3".into(), "25.1".into()] },
                Row::Header(vec![" WELL ".into(), "CT".into()]),
                Row::Data { index: 7, fields: vec!["7abc".into(), "30.2".into()] },
            ]
        );
    }

    #[test]
    fn rows_may_have_any_width_and_keep_quotes() {
        let rows = scan("Well\tA\tB\n1\t\"x\n2\ta\tb\tc\td\n").unwrap();
        assert_eq!(rows[1], Row::Data { index: 1, fields: vec!["1".into(), "\"x".into()] });
        assert!(matches!(&rows[2], Row::Data { fields, .. } if fields.len() == 5));
    }

    #[test]
    fn lenient_index_parsing() {
        assert_eq!(row_index(" 12"), Some(12));
        assert_eq!(row_index("+0"), Some(0));
        assert_eq!(row_index("-3"), None);
        assert_eq!(row_index("x1"), None);
    }
}

//! Reconciling a freshly fetched table against a persistent one.
//!
//! Rows of the destination are matched to source rows by an identity column.
//! New keys are appended at the bottom; existing rows keep their place, so
//! date columns written by earlier runs stay aligned with their tickets.

use anyhow::{bail, Result};
use tracing::debug;

use crate::model::issue::KEY_COLUMN;
use crate::sheet::{Cell, Record, Sheet};

/// Identity column names on each side of a merge.
#[derive(Debug, Clone, Copy)]
pub struct KeyColumns<'a> {
    pub dest: &'a str,
    pub source: &'a str,
}

impl Default for KeyColumns<'_> {
    fn default() -> Self {
        Self {
            dest: KEY_COLUMN,
            source: KEY_COLUMN,
        }
    }
}

impl KeyColumns<'_> {
    /// Source column feeding destination column `dest_column`.
    fn source_column<'c>(&'c self, dest_column: &'c str) -> &'c str {
        if dest_column == self.dest {
            self.source
        } else {
            dest_column
        }
    }
}

/// Identity values match only when both are non-empty and equal.
pub fn keys_match(a: &Cell, b: &Cell) -> bool {
    !a.is_empty() && a == b
}

fn find_match<'r>(needle: &Cell, haystack: &'r [Record], column: &str) -> Option<&'r Record> {
    haystack.iter().find(|row| keys_match(row.get(column), needle))
}

/// Source records with a non-empty key that no destination row carries.
/// A key repeated within the source is reported once.
pub fn missing_records<'s>(
    source: &'s [Record],
    dest: &[Record],
    keys: KeyColumns<'_>,
) -> Vec<&'s Record> {
    let mut seen: Vec<&Cell> = Vec::new();
    source
        .iter()
        .filter(|record| {
            let key = record.get(keys.source);
            if key.is_empty() || find_match(key, dest, keys.dest).is_some() {
                return false;
            }
            if seen.iter().any(|k| *k == key) {
                return false;
            }
            seen.push(key);
            true
        })
        .collect()
}

/// Append a row to `dest` for every source record whose key is not present
/// yet. Only columns named in the destination header are filled. Returns the
/// number of rows appended.
pub fn reconcile_new_rows(source: &[Record], dest: &mut Sheet, keys: KeyColumns<'_>) -> Result<usize> {
    let headers = dest.read_headers();
    if !headers.iter().any(|h| h == keys.dest) {
        bail!("Sheet {} has no {} column", dest.name, keys.dest);
    }
    let existing = dest.read_records();
    let missing = missing_records(source, &existing, keys);
    if missing.is_empty() {
        return Ok(0);
    }

    let start = existing.last().map_or(1, |r| r.row) + 1;
    for (offset, record) in missing.iter().enumerate() {
        let row = headers
            .iter()
            .map(|column| record.get(keys.source_column(column)).clone());
        dest.write_row(start + offset, 1, row);
    }
    debug!(sheet = %dest.name, appended = missing.len(), "appended new rows");
    Ok(missing.len())
}

/// Value of `value_column` from the matching source record for each
/// destination record, in destination order; blank where nothing matches.
pub fn materialize_column(
    source: &[Record],
    dest: &[Record],
    keys: KeyColumns<'_>,
    value_column: &str,
) -> Vec<Cell> {
    dest.iter()
        .map(|row| {
            find_match(row.get(keys.dest), source, keys.source)
                .map(|m| m.get(value_column).clone())
                .unwrap_or(Cell::Blank)
        })
        .collect()
}

/// Append missing rows to `dest`, then fill `column` from the source's
/// `value_column` for every destination row. Returns the number of rows
/// appended.
pub fn populate_column(
    source: &[Record],
    dest: &mut Sheet,
    column: usize,
    keys: KeyColumns<'_>,
    value_column: &str,
) -> Result<usize> {
    let appended = reconcile_new_rows(source, dest, keys)?;
    let records = dest.read_records();
    let values = materialize_column(source, &records, keys, value_column);

    // Rows between records (empty first cell) carry no ticket; blank them.
    let last_row = records.last().map_or(1, |r| r.row);
    let mut column_values = vec![Cell::Blank; last_row.saturating_sub(1)];
    for (record, value) in records.iter().zip(values) {
        column_values[record.row - 2] = value;
    }
    dest.write_column(column, 2, column_values);
    Ok(appended)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staging(rows: &[(&str, &str)]) -> Sheet {
        let mut sheet = Sheet::with_header("Query: Team 2024-01-01", &["Issue Key", "Summary", "Status"]);
        for (i, (key, status)) in rows.iter().enumerate() {
            sheet.write_row(
                i + 2,
                1,
                [Cell::text(*key), Cell::text(format!("About {key}")), Cell::text(*status)],
            );
        }
        sheet
    }

    #[test]
    fn scenario_a_appends_once() {
        let source = staging(&[("X-1", "Open")]).read_records();
        let mut dest = Sheet::with_header("Status: Team", &["Issue Key", "Status"]);

        populate_column(&source, &mut dest, 2, KeyColumns::default(), "Status").unwrap();
        assert_eq!(dest.display_rows()[1], vec!["X-1", "Open"]);

        let appended = populate_column(&source, &mut dest, 2, KeyColumns::default(), "Status").unwrap();
        assert_eq!(appended, 0);
        assert_eq!(dest.read_records().len(), 1);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let source = staging(&[("X-1", "Open"), ("X-2", "Done")]).read_records();
        let mut dest = Sheet::with_header("Status: Team", &["Issue Key", "Summary"]);
        assert_eq!(reconcile_new_rows(&source, &mut dest, KeyColumns::default()).unwrap(), 2);
        assert_eq!(reconcile_new_rows(&source, &mut dest, KeyColumns::default()).unwrap(), 0);
        assert_eq!(dest.read_records().len(), 2);
        assert_eq!(dest.get(3, 2), &Cell::text("About X-2"));
    }

    #[test]
    fn new_rows_fill_only_destination_columns() {
        let source = staging(&[("X-9", "Open")]).read_records();
        let mut dest = Sheet::with_header("Status: Team", &["Issue Type", "Issue Key"]);
        reconcile_new_rows(&source, &mut dest, KeyColumns::default()).unwrap();
        assert_eq!(dest.get(2, 1), &Cell::Blank);
        assert_eq!(dest.get(2, 2), &Cell::text("X-9"));
        assert_eq!(dest.get(2, 3), &Cell::Blank);
    }

    #[test]
    fn identity_column_can_be_renamed() {
        let source = staging(&[("X-1", "Open")]).read_records();
        let mut dest = Sheet::with_header("Status: Team", &["Key", "Summary"]);
        let keys = KeyColumns {
            dest: "Key",
            source: "Issue Key",
        };
        reconcile_new_rows(&source, &mut dest, keys).unwrap();
        assert_eq!(dest.get(2, 1), &Cell::text("X-1"));
        assert_eq!(dest.get(2, 2), &Cell::text("About X-1"));

        let values = materialize_column(&source, &dest.read_records(), keys, "Status");
        assert_eq!(values, vec![Cell::text("Open")]);
    }

    #[test]
    fn empty_keys_never_match() {
        assert!(!keys_match(&Cell::Blank, &Cell::Blank));
        assert!(!keys_match(&Cell::text(""), &Cell::text("")));
        assert!(keys_match(&Cell::text("X-1"), &Cell::text("X-1")));
        assert!(!keys_match(&Cell::text("1"), &Cell::Number(1.0)));

        let mut source_sheet = Sheet::with_header("src", &["Issue Type", "Issue Key", "Status"]);
        source_sheet.write_row(2, 1, [Cell::text("Bug"), Cell::Blank, Cell::text("Open")]);
        let source = source_sheet.read_records();
        let mut dest = Sheet::with_header("dst", &["Issue Type", "Issue Key"]);
        dest.write_row(2, 1, [Cell::text("Bug"), Cell::Blank]);

        assert!(missing_records(&source, &dest.read_records(), KeyColumns::default()).is_empty());
        let values = materialize_column(&source, &dest.read_records(), KeyColumns::default(), "Status");
        assert_eq!(values, vec![Cell::Blank]);
    }

    #[test]
    fn duplicate_source_keys_append_once() {
        let source = staging(&[("X-1", "Open"), ("X-1", "Open")]).read_records();
        let mut dest = Sheet::with_header("Status: Team", &["Issue Key"]);
        assert_eq!(reconcile_new_rows(&source, &mut dest, KeyColumns::default()).unwrap(), 1);
    }

    #[test]
    fn materialize_keeps_order_and_other_columns() {
        let mut dest = Sheet::with_header("Status: Team", &["Issue Key", "Summary"]);
        dest.write_row(2, 1, [Cell::text("X-3"), Cell::text("third")]);
        dest.write_row(3, 1, [Cell::text("X-1"), Cell::text("first")]);
        dest.write_row(4, 1, [Cell::text("X-2"), Cell::text("second")]);
        dest.set(2, 3, Cell::text("Old"));
        let before = dest.display_rows();

        let source = staging(&[("X-1", "Done"), ("X-4", "Open"), ("X-3", "Review")]).read_records();
        populate_column(&source, &mut dest, 4, KeyColumns::default(), "Status").unwrap();

        let after = dest.display_rows();
        let keys: Vec<&str> = after.iter().skip(1).map(|r| r[0].as_str()).collect();
        assert_eq!(keys, vec!["X-3", "X-1", "X-2", "X-4"]);
        for row in 1..4 {
            assert_eq!(after[row][..2], before[row][..2]);
        }
        assert_eq!(dest.get(2, 3), &Cell::text("Old"));
        assert_eq!(dest.get(2, 4), &Cell::text("Review"));
        assert_eq!(dest.get(3, 4), &Cell::text("Done"));
        assert_eq!(dest.get(4, 4), &Cell::Blank);
        assert_eq!(dest.get(5, 4), &Cell::text("Open"));
    }

    #[test]
    fn gap_rows_do_not_shift_values() {
        let mut dest = Sheet::with_header("Status: Team", &["Issue Key"]);
        dest.set(2, 1, Cell::text("X-1"));
        dest.set(4, 1, Cell::text("X-2"));
        let source = staging(&[("X-2", "Done"), ("X-1", "Open")]).read_records();

        populate_column(&source, &mut dest, 2, KeyColumns::default(), "Status").unwrap();
        assert_eq!(dest.get(2, 2), &Cell::text("Open"));
        assert_eq!(dest.get(3, 2), &Cell::Blank);
        assert_eq!(dest.get(4, 2), &Cell::text("Done"));
    }

    #[test]
    fn destination_without_key_column_is_an_error() {
        let source = staging(&[("X-1", "Open")]).read_records();
        let mut dest = Sheet::with_header("Status: Team", &["Summary"]);
        assert!(reconcile_new_rows(&source, &mut dest, KeyColumns::default()).is_err());
    }
}

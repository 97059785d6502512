use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use super::cell::Cell;

static BLANK: Cell = Cell::Blank;

/// One named grid of cells. Rows and columns are addressed 1-based, the way
/// spreadsheet users count them; row 1 is the header row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    cells: Vec<Vec<Cell>>,
    /// Exported chart images shown on this sheet, in chart-index order.
    #[serde(default)]
    pub charts: Vec<PathBuf>,
}

/// A body row read through the header: column name to value.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub row: usize,
    values: HashMap<String, Cell>,
}

impl Record {
    pub fn new(row: usize, values: HashMap<String, Cell>) -> Self {
        Self { row, values }
    }

    /// Value of `column`, or a blank cell when the record has no such column.
    pub fn get(&self, column: &str) -> &Cell {
        self.values.get(column).unwrap_or(&BLANK)
    }
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_header<S: AsRef<str>>(name: impl Into<String>, columns: &[S]) -> Self {
        let mut sheet = Self::new(name);
        sheet.write_row(1, 1, columns.iter().map(|c| Cell::text(c.as_ref())));
        sheet
    }

    pub fn max_rows(&self) -> usize {
        self.cells.len()
    }

    pub fn max_columns(&self) -> usize {
        self.cells.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn get(&self, row: usize, column: usize) -> &Cell {
        if row == 0 || column == 0 {
            return &BLANK;
        }
        self.cells
            .get(row - 1)
            .and_then(|r| r.get(column - 1))
            .unwrap_or(&BLANK)
    }

    /// Store a value, growing the grid as needed.
    pub fn set(&mut self, row: usize, column: usize, value: Cell) {
        assert!(row > 0 && column > 0, "sheet addresses are 1-based");
        if self.cells.len() < row {
            self.cells.resize_with(row, Vec::new);
        }
        let cells = &mut self.cells[row - 1];
        if cells.len() < column {
            cells.resize(column, Cell::Blank);
        }
        cells[column - 1] = value;
    }

    /// Write a vertical run of values into one column starting at `start_row`.
    pub fn write_column(
        &mut self,
        column: usize,
        start_row: usize,
        values: impl IntoIterator<Item = Cell>,
    ) {
        for (offset, value) in values.into_iter().enumerate() {
            self.set(start_row + offset, column, value);
        }
    }

    pub fn write_row(&mut self, row: usize, start_column: usize, values: impl IntoIterator<Item = Cell>) {
        for (offset, value) in values.into_iter().enumerate() {
            self.set(row, start_column + offset, value);
        }
    }

    /// Insert an empty column before `column`, shifting later cells right.
    pub fn insert_column(&mut self, column: usize) {
        assert!(column > 0, "sheet addresses are 1-based");
        for row in &mut self.cells {
            if row.len() >= column {
                row.insert(column - 1, Cell::Blank);
            }
        }
    }

    /// Column names from row 1, up to (not including) the first blank or
    /// non-text cell.
    pub fn read_headers(&self) -> Vec<String> {
        let Some(header) = self.cells.first() else {
            return Vec::new();
        };
        header
            .iter()
            .map_while(|cell| match cell {
                Cell::Text(s) if !s.is_empty() => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    /// 1-based position of a header column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.read_headers()
            .iter()
            .position(|h| h == name)
            .map(|i| i + 1)
    }

    /// Body rows whose first cell is non-empty, keyed by header name.
    pub fn read_records(&self) -> Vec<Record> {
        let headers = self.read_headers();
        if headers.is_empty() {
            return Vec::new();
        }
        (2..=self.max_rows())
            .filter(|&row| !self.get(row, 1).is_empty())
            .map(|row| {
                let values = headers
                    .iter()
                    .enumerate()
                    .map(|(i, name)| (name.clone(), self.get(row, i + 1).clone()))
                    .collect();
                Record::new(row, values)
            })
            .collect()
    }

    /// Row of the bottom-most record, or 1 (the header) when there is none.
    pub fn last_record_row(&self) -> usize {
        self.read_records().last().map_or(1, |r| r.row)
    }

    /// Column whose header holds `date`, compared by calendar date.
    pub fn find_column_by_date_label(&self, date: NaiveDate) -> Option<usize> {
        (1..=self.max_columns()).find(|&column| self.get(1, column).as_date() == Some(date))
    }

    /// Right-most column whose header is a literal date (formula headers are
    /// skipped).
    pub fn last_date_column(&self) -> Option<usize> {
        (1..=self.max_columns())
            .filter(|&column| self.get(1, column).as_date().is_some())
            .last()
    }

    /// All literal date headers with their columns, left to right.
    pub fn date_columns(&self) -> Vec<(usize, NaiveDate)> {
        (1..=self.max_columns())
            .filter_map(|column| self.get(1, column).as_date().map(|d| (column, d)))
            .collect()
    }

    /// Rows as display strings, trailing blanks trimmed.
    pub fn display_rows(&self) -> Vec<Vec<String>> {
        self.cells
            .iter()
            .map(|row| {
                let mut out: Vec<String> = row.iter().map(ToString::to_string).collect();
                while out.last().is_some_and(String::is_empty) {
                    out.pop();
                }
                out
            })
            .collect()
    }
}

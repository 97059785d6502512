//! Top-level runs over every status sheet: appending today's snapshot column
//! and backfilling all date columns from ticket histories.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::ConfigurationError;
use crate::merge::{populate_column, KeyColumns};
use crate::model::issue::{KEY_COLUMN, STAGING_COLUMNS, STATUS_COLUMN};
use crate::sheet::{Cell, Sheet, Workbook};
use crate::timeline::{reconstruct, sample_at};
use crate::tracker::{fetch_all, IssueTracker};
use crate::util::dates::date_label;

pub const STATUS_PREFIX: &str = "Status: ";
pub const STAGING_PREFIX: &str = "Query: ";

/// Default header of a new status sheet.
pub const STATUS_COLUMNS: [&str; 4] = ["Issue Type", "Issue Key", "Summary", "Epic Key"];

/// Same-day staging sheet for a status sheet, e.g.
/// `Status: Team` -> `Query: Team 2024-03-01`.
pub fn staging_sheet_name(status_sheet: &str, date: NaiveDate) -> String {
    let base = status_sheet.strip_prefix(STATUS_PREFIX).unwrap_or(status_sheet);
    format!("{STAGING_PREFIX}{base} {}", date_label(date))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotReport {
    pub sheet: String,
    /// Tickets fetched, or `None` when today's staging sheet was reused.
    pub fetched: Option<usize>,
    pub appended: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillReport {
    pub sheet: String,
    pub rows: usize,
    pub columns: usize,
}

/// Capture every status sheet's current statuses into today's date column.
/// The workbook is saved after each sheet.
pub async fn append_current_snapshot<T: IssueTracker + ?Sized>(
    tracker: &T,
    book: &mut Workbook,
    today: NaiveDate,
) -> Result<Vec<SnapshotReport>> {
    let mut reports = Vec::new();
    for name in book.sheet_names_with_prefix(STATUS_PREFIX) {
        let report = append_sheet_snapshot(tracker, book, &name, today)
            .await
            .with_context(|| format!("Snapshot of {name} failed"))?;
        book.save()?;
        info!(
            sheet = %name,
            column = report.column,
            appended = report.appended,
            reused_staging = report.fetched.is_none(),
            "snapshot written"
        );
        reports.push(report);
    }
    Ok(reports)
}

async fn append_sheet_snapshot<T: IssueTracker + ?Sized>(
    tracker: &T,
    book: &mut Workbook,
    name: &str,
    today: NaiveDate,
) -> Result<SnapshotReport> {
    let staging_name = staging_sheet_name(name, today);
    let mut fetched = None;
    if book.sheet(&staging_name).is_none() {
        let jql = book.query(name);
        if jql.is_empty() {
            return Err(ConfigurationError::MissingQuery {
                sheet: name.to_string(),
            }
            .into());
        }
        let issues = fetch_all(tracker, &jql).await?;
        let mut staging = Sheet::with_header(staging_name.as_str(), &STAGING_COLUMNS);
        for (i, issue) in issues.iter().enumerate() {
            staging.write_row(i + 2, 1, issue.to_row());
        }
        book.insert_sheet(staging);
        fetched = Some(issues.len());
    } else {
        debug!(sheet = %staging_name, "reusing today's staging sheet");
    }

    let source = book.require_sheet(&staging_name)?.read_records();
    let dest = book.require_sheet_mut(name)?;
    let column = match dest.find_column_by_date_label(today) {
        Some(column) => column,
        None => {
            let column = dest.max_columns() + 1;
            dest.set(1, column, Cell::Date(today));
            column
        }
    };
    let appended = populate_column(&source, dest, column, KeyColumns::default(), STATUS_COLUMN)?;
    book.require_sheet_mut(&staging_name)?.hidden = true;

    Ok(SnapshotReport {
        sheet: name.to_string(),
        fetched,
        appended,
        column,
    })
}

/// Recompute every date column of every status sheet from ticket histories.
/// One history request per row; the workbook is saved after each sheet.
pub async fn backfill_history<T: IssueTracker + ?Sized>(
    tracker: &T,
    book: &mut Workbook,
) -> Result<Vec<BackfillReport>> {
    let mut reports = Vec::new();
    for name in book.sheet_names_with_prefix(STATUS_PREFIX) {
        let report = backfill_sheet(tracker, book, &name)
            .await
            .with_context(|| format!("Backfill of {name} failed"))?;
        book.save()?;
        info!(sheet = %name, rows = report.rows, columns = report.columns, "backfill written");
        reports.push(report);
    }
    Ok(reports)
}

async fn backfill_sheet<T: IssueTracker + ?Sized>(
    tracker: &T,
    book: &mut Workbook,
    name: &str,
) -> Result<BackfillReport> {
    let sheet = book.require_sheet(name)?;
    let mut columns = sheet.date_columns();
    columns.sort_by_key(|&(_, date)| date);
    let dates: Vec<NaiveDate> = columns.iter().map(|&(_, date)| date).collect();
    let rows: Vec<(usize, String)> = sheet
        .read_records()
        .iter()
        .filter(|r| !r.get(KEY_COLUMN).is_empty())
        .map(|r| (r.row, r.get(KEY_COLUMN).to_string()))
        .collect();

    if columns.is_empty() {
        return Ok(BackfillReport {
            sheet: name.to_string(),
            rows: 0,
            columns: 0,
        });
    }

    for (row, key) in &rows {
        let history = tracker.change_history(key).await?;
        let timeline = reconstruct(&history);
        let statuses = sample_at(&timeline, &dates)?;
        debug!(key = %key, created = %timeline.created().date(), transitions = timeline.len(), "sampled timeline");

        let sheet = book.require_sheet_mut(name)?;
        for (&(column, _), status) in columns.iter().zip(statuses) {
            let value = if status.is_empty() {
                Cell::Blank
            } else {
                Cell::Text(status)
            };
            sheet.set(*row, column, value);
        }
    }

    Ok(BackfillReport {
        sheet: name.to_string(),
        rows: rows.len(),
        columns: columns.len(),
    })
}

/// Insert a column for `today` right after the last literal date column and
/// fill it with a copy of that column's body. Returns false when today's
/// column exists or there is no date column to extend.
///
/// Formula cells are copied verbatim: relative references are not shifted,
/// so the new column repeats the previous column's formulas rather than
/// continuing a spreadsheet-style fill series.
pub fn add_today_column(sheet: &mut Sheet, today: NaiveDate) -> bool {
    if sheet.find_column_by_date_label(today).is_some() {
        return false;
    }
    let Some(last) = sheet.last_date_column() else {
        return false;
    };
    let column = last + 1;
    sheet.insert_column(column);
    sheet.set(1, column, Cell::Date(today));
    for row in 2..=sheet.max_rows() {
        let value = sheet.get(row, last).clone();
        if !matches!(value, Cell::Blank) {
            sheet.set(row, column, value);
        }
    }
    true
}

//! Chart publication driven by the `Data: Charts` sheet.
//!
//! Each record names a sheet, the index of a chart image registered on it and
//! the wiki page it is attached to. The first publish creates the attachment
//! and writes its id back into the record; later publishes update it.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::ConfigurationError;
use crate::sheet::{Cell, Record, Sheet, Workbook};
use crate::snapshot::add_today_column;
use crate::wiki::{Attachment, AttachmentService};

pub const CHARTS_SHEET: &str = "Data: Charts";
pub const SHEET_NAME: &str = "Sheet Name";
pub const CHART_INDEX: &str = "Chart Index";
pub const PAGE_ID: &str = "Confluence PageID";
pub const ATTACHMENT_ID: &str = "Confluence AttachmentID";
pub const FILE_TYPE: &str = "File Type";
pub const CHART_COLUMNS: [&str; 5] = [SHEET_NAME, CHART_INDEX, PAGE_ID, ATTACHMENT_ID, FILE_TYPE];

pub const DEFAULT_FILE_TYPE: &str = "image/png";

#[derive(Debug, Clone, PartialEq)]
pub struct ChartPublication {
    /// Row of the record in the charts sheet.
    pub row: usize,
    pub sheet: String,
    pub index: usize,
    pub page_id: Cell,
    pub attachment_id: Option<String>,
    pub file_type: String,
    pub image: PathBuf,
}

impl ChartPublication {
    fn from_record(book: &Workbook, record: &Record) -> Result<Self> {
        let sheet_name = record.get(SHEET_NAME).to_string();
        let sheet = book.require_sheet(&sheet_name)?;
        let index_cell = record.get(CHART_INDEX);
        let index = index_cell
            .as_number()
            .filter(|n| *n >= 0.0 && n.fract() == 0.0)
            .map(|n| n as usize)
            .filter(|&i| i < sheet.charts.len())
            .ok_or_else(|| ConfigurationError::MissingChart {
                sheet: sheet_name.clone(),
                index: index_cell.to_string(),
            })?;
        let attachment_id = Some(record.get(ATTACHMENT_ID))
            .filter(|c| !c.is_empty())
            .map(ToString::to_string);
        let file_type = match record.get(FILE_TYPE) {
            c if c.is_empty() => DEFAULT_FILE_TYPE.to_string(),
            c => c.to_string(),
        };

        Ok(Self {
            row: record.row,
            image: sheet.charts[index].clone(),
            sheet: sheet_name,
            index,
            page_id: record.get(PAGE_ID).clone(),
            attachment_id,
            file_type,
        })
    }

    /// The wiki page id, which must be a whole number.
    pub fn numeric_page_id(&self) -> Result<String> {
        let id = match &self.page_id {
            Cell::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Some(self.page_id.to_string()),
            Cell::Text(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => Some(s.clone()),
            _ => None,
        };
        id.ok_or_else(|| {
            ConfigurationError::NonNumericPageId {
                sheet: self.sheet.clone(),
                value: self.page_id.to_string(),
            }
            .into()
        })
    }

    pub fn file_name(&self) -> String {
        self.image
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("chart{}.png", self.index))
    }

    fn read_attachment(&self) -> Result<Attachment> {
        let bytes = std::fs::read(&self.image)
            .with_context(|| format!("Failed to read chart image {}", self.image.display()))?;
        Ok(Attachment {
            file_name: self.file_name(),
            content_type: self.file_type.clone(),
            bytes,
        })
    }
}

/// Every record of the charts sheet, validated against the workbook.
pub fn load_chart_records(book: &Workbook) -> Result<Vec<ChartPublication>> {
    book.require_sheet(CHARTS_SHEET)?
        .read_records()
        .iter()
        .map(|record| ChartPublication::from_record(book, record))
        .collect()
}

/// Register an exported chart image on `sheet`; returns its chart index.
pub fn add_chart_image(book: &mut Workbook, sheet: &str, image: &Path) -> Result<usize> {
    if !image.is_file() {
        anyhow::bail!("Chart image {} does not exist", image.display());
    }
    let sheet = book.require_sheet_mut(sheet)?;
    sheet.charts.push(image.to_path_buf());
    Ok(sheet.charts.len() - 1)
}

/// Append a publication record, creating the charts sheet on first use.
/// Returns the record's row.
pub fn register_chart(
    book: &mut Workbook,
    sheet: &str,
    index: usize,
    page_id: u64,
    file_type: Option<&str>,
) -> Result<usize> {
    book.require_sheet(sheet)?;
    if book.sheet(CHARTS_SHEET).is_none() {
        book.insert_sheet(Sheet::with_header(CHARTS_SHEET, &CHART_COLUMNS));
    }
    let charts = book.require_sheet_mut(CHARTS_SHEET)?;
    let headers = charts.read_headers();
    let row = charts.last_record_row() + 1;
    for (i, column) in headers.iter().enumerate() {
        let value = match column.as_str() {
            SHEET_NAME => Cell::text(sheet),
            CHART_INDEX => Cell::Number(index as f64),
            PAGE_ID => Cell::Number(page_id as f64),
            FILE_TYPE => Cell::text(file_type.unwrap_or(DEFAULT_FILE_TYPE)),
            _ => continue,
        };
        charts.set(row, i + 1, value);
    }
    Ok(row)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Created { sheet: String, attachment_id: Option<String> },
    Updated { sheet: String, attachment_id: String },
}

/// Upload every registered chart to its wiki page. New attachment ids are
/// written back and the workbook saved right away.
pub async fn publish_to_wiki<W: AttachmentService + ?Sized>(
    wiki: &W,
    book: &mut Workbook,
) -> Result<Vec<PublishOutcome>> {
    let records = load_chart_records(book)?;
    let mut outcomes = Vec::with_capacity(records.len());
    for record in records {
        let page_id = record.numeric_page_id()?;
        let file = record.read_attachment()?;
        match &record.attachment_id {
            Some(attachment_id) => {
                wiki.update_attachment(&page_id, attachment_id, file).await?;
                info!(sheet = %record.sheet, %page_id, %attachment_id, "chart updated");
                outcomes.push(PublishOutcome::Updated {
                    sheet: record.sheet,
                    attachment_id: attachment_id.clone(),
                });
            }
            None => {
                let created = wiki.create_attachment(&page_id, file).await?;
                if let Some(id) = &created {
                    let charts = book.require_sheet_mut(CHARTS_SHEET)?;
                    if let Some(column) = charts.column_index(ATTACHMENT_ID) {
                        charts.set(record.row, column, Cell::text(id.as_str()));
                        book.save()?;
                    }
                }
                info!(sheet = %record.sheet, %page_id, attachment_id = ?created, "chart attached");
                outcomes.push(PublishOutcome::Created {
                    sheet: record.sheet,
                    attachment_id: created,
                });
            }
        }
    }
    Ok(outcomes)
}

/// Copy every registered chart into `dir` as `<workbook name> <file name>`.
pub fn export_charts(book: &Workbook, dir: &Path) -> Result<Vec<PathBuf>> {
    let records = load_chart_records(book)?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let prefix = book.name();
    records
        .iter()
        .map(|record| {
            let target = dir.join(format!("{prefix} {}", record.file_name()));
            std::fs::copy(&record.image, &target).with_context(|| {
                format!("Failed to copy {} to {}", record.image.display(), target.display())
            })?;
            Ok(target)
        })
        .collect()
}

/// Give every charted sheet a column for `today`. Returns the sheets extended.
pub fn extend_chart_sheets(book: &mut Workbook, today: NaiveDate) -> Result<Vec<String>> {
    let mut extended = Vec::new();
    for record in load_chart_records(book)? {
        let sheet = book.require_sheet_mut(&record.sheet)?;
        if add_today_column(sheet, today) {
            extended.push(record.sheet);
        }
    }
    Ok(extended)
}

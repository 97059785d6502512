use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::table::Sheet;
use crate::error::ConfigurationError;

/// Metadata key under which a status sheet's tracker query is kept.
pub const QUERY_KEY: &str = "jiraQuery";

#[derive(Debug, Default, Serialize, Deserialize)]
struct WorkbookData {
    #[serde(default)]
    sheets: Vec<Sheet>,
    /// Out-of-band metadata per sheet name.
    #[serde(default)]
    metadata: BTreeMap<String, BTreeMap<String, String>>,
}

/// The persisted set of sheets, stored as one JSON document.
pub struct Workbook {
    path: PathBuf,
    data: WorkbookData,
}

impl Workbook {
    /// Load the workbook at `path`, or start an empty one if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse workbook {}", path.display()))?
        } else {
            WorkbookData::default()
        };
        Ok(Self { path, data })
    }

    /// Write the workbook through a sibling temp file renamed over the
    /// target, so an interrupted save leaves the previous copy intact.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.data)?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = File::create(&temp_path)
            .with_context(|| format!("Failed to create {}", temp_path.display()))?;
        file.write_all(json.as_bytes())
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        file.sync_all()?;
        fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File stem of the workbook, used to prefix exported files.
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "workbook".to_string())
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.data.sheets
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.data.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.data.sheets.iter_mut().find(|s| s.name == name)
    }

    /// Like [`Workbook::sheet`], failing with a configuration error when absent.
    pub fn require_sheet(&self, name: &str) -> Result<&Sheet> {
        self.sheet(name)
            .ok_or_else(|| ConfigurationError::MissingSheet(name.to_string()).into())
    }

    pub fn require_sheet_mut(&mut self, name: &str) -> Result<&mut Sheet> {
        self.sheet_mut(name)
            .ok_or_else(|| ConfigurationError::MissingSheet(name.to_string()).into())
    }

    /// Append a sheet, replacing none. Returns false if the name is taken.
    pub fn insert_sheet(&mut self, sheet: Sheet) -> bool {
        if self.sheet(&sheet.name).is_some() {
            return false;
        }
        self.data.sheets.push(sheet);
        true
    }

    /// Names of sheets starting with `prefix`, in workbook order.
    pub fn sheet_names_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.data
            .sheets
            .iter()
            .filter(|s| s.name.starts_with(prefix))
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn metadata(&self, sheet: &str, key: &str) -> Option<&str> {
        self.data
            .metadata
            .get(sheet)
            .and_then(|m| m.get(key))
            .map(String::as_str)
    }

    pub fn set_metadata(&mut self, sheet: &str, key: &str, value: &str) -> Result<()> {
        self.require_sheet(sheet)?;
        self.data
            .metadata
            .entry(sheet.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Tracker query attached to `sheet`; empty when none was ever saved.
    pub fn query(&self, sheet: &str) -> String {
        self.metadata(sheet, QUERY_KEY).unwrap_or_default().to_string()
    }

    pub fn save_query(&mut self, sheet: &str, jql: &str) -> Result<()> {
        self.set_metadata(sheet, QUERY_KEY, jql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::cell::Cell;

    #[test]
    fn query_is_empty_until_saved() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = Workbook::open(dir.path().join("book.json")).unwrap();
        book.insert_sheet(Sheet::new("Status: Team"));

        assert_eq!(book.query("Status: Team"), "");
        book.save_query("Status: Team", "project = X").unwrap();
        assert_eq!(book.query("Status: Team"), "project = X");
        book.save_query("Status: Team", "project = Y").unwrap();
        assert_eq!(book.query("Status: Team"), "project = Y");
    }

    #[test]
    fn saving_query_on_missing_sheet_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = Workbook::open(dir.path().join("book.json")).unwrap();
        let err = book.save_query("Status: Ghost", "project = X").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigurationError>(),
            Some(ConfigurationError::MissingSheet(name)) if name == "Status: Ghost"
        ));
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("book.json");
        {
            let mut book = Workbook::open(&path).unwrap();
            let mut sheet = Sheet::with_header("Status: Team", &["Issue Key"]);
            sheet.set(2, 1, Cell::text("X-1"));
            sheet.hidden = true;
            book.insert_sheet(sheet);
            book.save_query("Status: Team", "project = X").unwrap();
            book.save().unwrap();
        }
        let book = Workbook::open(&path).unwrap();
        let sheet = book.sheet("Status: Team").unwrap();
        assert!(sheet.hidden);
        assert_eq!(sheet.get(2, 1), &Cell::text("X-1"));
        assert_eq!(book.query("Status: Team"), "project = X");
        assert_eq!(book.name(), "book");
    }

    #[test]
    fn repeated_saves_replace_the_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.json");
        let mut book = Workbook::open(&path).unwrap();
        book.insert_sheet(Sheet::with_header("Status: Team", &["Issue Key"]));
        book.save().unwrap();
        book.require_sheet_mut("Status: Team")
            .unwrap()
            .set(2, 1, Cell::text("X-1"));
        book.save().unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "left behind: {leftovers:?}");

        let reopened = Workbook::open(&path).unwrap();
        assert_eq!(reopened.sheet("Status: Team").unwrap().get(2, 1), &Cell::text("X-1"));
    }

    #[test]
    fn interrupted_save_leaves_previous_copy_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.json");
        let mut book = Workbook::open(&path).unwrap();
        book.insert_sheet(Sheet::new("Status: Team"));
        book.save().unwrap();

        // a save that died before the rename leaves only a partial temp file
        std::fs::write(path.with_extension("tmp"), "{\"sheets\": [").unwrap();

        let reopened = Workbook::open(&path).unwrap();
        assert!(reopened.sheet("Status: Team").is_some());
        reopened.save().unwrap();
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn duplicate_sheet_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = Workbook::open(dir.path().join("book.json")).unwrap();
        assert!(book.insert_sheet(Sheet::new("Status: A")));
        assert!(!book.insert_sheet(Sheet::new("Status: A")));
        book.insert_sheet(Sheet::new("Data: Charts"));
        assert_eq!(book.sheet_names_with_prefix("Status: "), vec!["Status: A"]);
    }
}

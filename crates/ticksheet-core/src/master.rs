//! Master list loading and validation.
//!
//! The master list is the fixed, ordered reference every pipeline output must
//! mirror row for row. It is loaded once per session and read-only after that.

use crate::csvio::{self, CsvError};
use crate::types::MasterRow;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors from master list loading.
#[derive(Error, Debug)]
pub enum MasterError {
    #[error("Failed to read master list file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse master list CSV: {0}")]
    CsvError(#[from] CsvError),

    #[error("Master list is missing required column: {0}")]
    MissingColumn(String),

    #[error("Master list contains no usable rows")]
    Empty,

    #[error("Duplicate master code: {0}")]
    DuplicateCode(String),
}

/// The immutable, ordered master row sequence for a session.
#[derive(Debug, Clone)]
pub struct MasterList {
    rows: Vec<MasterRow>,
}

impl MasterList {
    /// Build a master list from rows, rejecting duplicates and emptiness.
    pub fn new(rows: Vec<MasterRow>) -> Result<Self, MasterError> {
        if rows.is_empty() {
            return Err(MasterError::Empty);
        }
        let mut seen = std::collections::HashSet::new();
        for row in &rows {
            if !seen.insert(row.code.as_str()) {
                return Err(MasterError::DuplicateCode(row.code.clone()));
            }
        }
        Ok(Self { rows })
    }

    /// Load from a CSV file with columns `code,name,is_title`.
    ///
    /// Rows with neither code nor name are skipped. Unrecognized `is_title`
    /// values default to `N`. Fails hard if required columns are absent or
    /// the file yields zero usable rows.
    pub fn from_csv_file(path: impl AsRef<Path>) -> Result<Self, MasterError> {
        let contents = fs::read_to_string(path)?;
        Self::from_csv(&contents)
    }

    /// Load from CSV text. See [`from_csv_file`](Self::from_csv_file).
    pub fn from_csv(text: &str) -> Result<Self, MasterError> {
        let records = csvio::parse(text)?;
        let mut iter = records.into_iter();
        let header = iter.next().ok_or(MasterError::Empty)?;

        let col = |name: &str| -> Result<usize, MasterError> {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| MasterError::MissingColumn(name.to_string()))
        };
        let code_col = col("code")?;
        let name_col = col("name")?;
        let title_col = col("is_title")?;

        let mut rows = Vec::new();
        for record in iter {
            let code = record.get(code_col).map(|s| s.trim()).unwrap_or("");
            let name = record.get(name_col).map(|s| s.trim()).unwrap_or("");
            if code.is_empty() && name.is_empty() {
                continue;
            }
            let is_title = record
                .get(title_col)
                .map(|s| s.trim().eq_ignore_ascii_case("y"))
                .unwrap_or(false);
            rows.push(MasterRow {
                code: code.to_string(),
                name: name.to_string(),
                is_title,
            });
        }

        Self::new(rows)
    }

    pub fn rows(&self) -> &[MasterRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MasterRow> {
        self.rows.iter()
    }

    /// Data rows only (titles excluded).
    pub fn features(&self) -> impl Iterator<Item = &MasterRow> {
        self.rows.iter().filter(|r| !r.is_title)
    }
}

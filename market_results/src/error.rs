//! Error taxonomy shared by the fetch and write stages.

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// Every failure a run can end with. None of them are retried.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Results page unreachable, navigation failed, or the table never rendered.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// The page loaded but shows no results for the requested day.
    #[error("no market results published for {date}: {reason}")]
    NoData {
        /// Requested delivery day.
        date: NaiveDate,
        /// What was observed on the page.
        reason: String,
    },

    /// Template missing, unreadable, or without the expected sheet/header.
    #[error("template {}: {reason}", path.display())]
    Template {
        /// Template path as given.
        path: PathBuf,
        /// Why it could not be used.
        reason: String,
    },

    /// Output workbook could not be saved.
    #[error("cannot write {}: {reason}", path.display())]
    Write {
        /// Output path as given.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },

    /// A row carries more cells than the template has header columns.
    #[error("row {row} has {width} cells but the template header defines {columns} columns")]
    SchemaMismatch {
        /// 1-based row index in the result table.
        row: usize,
        /// Label plus field count of that row.
        width: usize,
        /// Designated template columns.
        columns: usize,
    },

    /// Malformed date, bad option value, or conflicting paths.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ScrapeError {
    /// Process exit status for this error. `2` matches clap's usage errors.
    pub fn exit_code(&self) -> u8 {
        match self {
            ScrapeError::InvalidArgument(_) => 2,
            ScrapeError::Fetch(_) => 3,
            ScrapeError::NoData { .. } => 4,
            ScrapeError::Template { .. } => 5,
            ScrapeError::Write { .. } => 6,
            ScrapeError::SchemaMismatch { .. } => 7,
        }
    }

    pub(crate) fn template(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ScrapeError::Template {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ScrapeError::Write {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

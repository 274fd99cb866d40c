//! Error taxonomy shared by every conversion shape.
//!
//! Core operations return [`Result`]; the command layer in `lib.rs` wraps these
//! with `anyhow` context before reporting them.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::schema::FieldType;

pub type Result<T, E = CsvRecordsError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum CsvRecordsError {
    /// Required settings are missing or contradict each other.
    #[error("invalid configuration: {}", .problems.join("; "))]
    Configuration { problems: Vec<String> },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error in {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A typed field held a value that does not parse as its declared type.
    #[error(
        "cannot convert '{raw_value}' to {target} for field '{field}'{}{}",
        .row.map(|r| format!(" at row {r}")).unwrap_or_default(),
        .path.as_ref().map(|p| format!(" in {p:?}")).unwrap_or_default()
    )]
    Conversion {
        field: String,
        raw_value: String,
        target: FieldType,
        row: Option<usize>,
        path: Option<PathBuf>,
    },

    #[error("schema error: {0}")]
    Schema(String),
}

impl CsvRecordsError {
    pub fn configuration(problem: impl Into<String>) -> Self {
        CsvRecordsError::Configuration {
            problems: vec![problem.into()],
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CsvRecordsError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        CsvRecordsError::Csv {
            path: path.into(),
            source,
        }
    }

    /// Attaches the source file to a conversion failure that did not know it yet.
    pub fn with_path(self, file: impl Into<PathBuf>) -> Self {
        match self {
            CsvRecordsError::Conversion {
                field,
                raw_value,
                target,
                row,
                path: None,
            } => CsvRecordsError::Conversion {
                field,
                raw_value,
                target,
                row,
                path: Some(file.into()),
            },
            other => other,
        }
    }

    /// Attaches a 1-based row number to a conversion failure.
    pub fn with_row(self, row_number: usize) -> Self {
        match self {
            CsvRecordsError::Conversion {
                field,
                raw_value,
                target,
                row: None,
                path,
            } => CsvRecordsError::Conversion {
                field,
                raw_value,
                target,
                row: Some(row_number),
                path,
            },
            other => other,
        }
    }
}

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::parser::extract::Field;

/// A required field could not be located after every strategy ran.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("{field}: no marker and no anchor element in document")]
    MissingAnchor { field: Field },
    #[error("{field}: no matching node within {steps} nodes of the anchor")]
    ScanExhausted { field: Field, steps: usize },
    #[error("{field}: unusable value {value:?}")]
    InvalidValue { field: Field, value: String },
}

impl ExtractionError {
    pub fn field(&self) -> Field {
        match self {
            ExtractionError::MissingAnchor { field }
            | ExtractionError::ScanExhausted { field, .. }
            | ExtractionError::InvalidValue { field, .. } => *field,
        }
    }
}

/// Failure of one document. Contained by the batch, never fatal.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("read failed: {0}")]
    Read(#[from] io::Error),
    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractionError),
}

/// Postal code absent from the lookup table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid postal code: {postal_code:?} (course {course:?})")]
pub struct LookupMiss {
    pub course: String,
    pub postal_code: String,
}

/// Non-fatal structural issue; the record is still emitted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    #[error("comma in name of course {name:?}")]
    DelimiterInName { name: String },
    #[error("{field} not found, placeholder {value:?} used")]
    PlaceholderUsed { field: Field, value: String },
    #[error("{field} value {value:?} is not a decimal coordinate")]
    InvalidCoordinate { field: Field, value: String },
    #[error("duplicate course {name:?} ({postal_code}) dropped")]
    DuplicateCourse { name: String, postal_code: String },
}

/// Setup or output failure. Aborts the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed csv in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("cannot back up {} to {}: {source}", from.display(), to.display())]
    Backup {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    pub fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PipelineError::Read {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PipelineError::Write {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        PipelineError::Csv {
            path: path.into(),
            source,
        }
    }
}

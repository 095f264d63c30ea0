//! Error taxonomy shared by the ingestion pipeline and the read/write services.

use crate::client::SourceError;
use crate::db::store::StorageError;
use chrono::NaiveDate;
use core::fmt;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// The source answered but carried no usable high temperature.
    MissingMeasurement { location: String, date: NaiveDate },
    /// Transport, timeout or status failure from either weather source.
    SourceUnavailable { status: Option<u16>, message: String },
    /// Malformed backfill input; rejected before any unit runs.
    InvalidRange(String),
    /// A persistence operation failed.
    StorageFailure { operation: String, message: String },
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::MissingMeasurement { location, date } => {
                write!(f, "missing temperature for {} on {}", location, date)
            }
            PipelineError::SourceUnavailable {
                status: Some(status),
                message,
            } => write!(f, "weather source {}: {}", status, message),
            PipelineError::SourceUnavailable { status: None, message } => {
                write!(f, "weather source unavailable: {}", message)
            }
            PipelineError::InvalidRange(msg) => write!(f, "invalid range: {}", msg),
            PipelineError::StorageFailure { operation, message } => {
                write!(f, "storage failure during {}: {}", operation, message)
            }
        }
    }
}

impl Error for PipelineError {}

impl From<SourceError> for PipelineError {
    fn from(value: SourceError) -> Self {
        match value {
            SourceError::Http { status, message } => PipelineError::SourceUnavailable {
                status: Some(status),
                message,
            },
            other => PipelineError::SourceUnavailable {
                status: None,
                message: other.to_string(),
            },
        }
    }
}

impl From<StorageError> for PipelineError {
    fn from(value: StorageError) -> Self {
        PipelineError::StorageFailure {
            operation: value.operation.to_string(),
            message: value.message,
        }
    }
}

/// A failed reconciliation unit, tagged with the (date, location) it was for.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileError {
    pub date: NaiveDate,
    pub location: String,
    pub error: PipelineError,
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}: {}", self.location, self.date, self.error)
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

//! Error taxonomy for coverage analysis
//!
//! Fatal conditions surface as [`CoverageError`]. Soft data anomalies never
//! become errors; they are absorbed with a fallback value and recorded in
//! [`crate::models::AnomalyLog`] instead.

use chrono::NaiveDateTime;
use std::path::PathBuf;
use thiserror::Error;

/// Exit code for a target hour outside the billing data's observed range.
pub const EXIT_HOUR_OUT_OF_RANGE: i32 = 3;
/// Exit code for an input file that cannot be read or decoded.
pub const EXIT_MALFORMED_INPUT: i32 = 4;
/// Exit code for an invalid command line argument. Matches clap's usage error code.
pub const EXIT_INVALID_ARGUMENT: i32 = 2;

#[derive(Debug, Error)]
pub enum CoverageError {
    #[error("invalid target hour '{input}': {reason} (expected YYYY-MM-DD/HH)")]
    InvalidTargetHour { input: String, reason: String },

    #[error("target hour {hour} is out of the billing data range ({first} - {last})")]
    HourOutOfRange {
        hour: NaiveDateTime,
        first: NaiveDateTime,
        last: NaiveDateTime,
    },

    #[error("billing data contains no EC2 running-instance rows, target hour {hour} cannot be validated")]
    NoComputeUsage { hour: NaiveDateTime },

    #[error("billing file {}: {message}", .path.display())]
    Billing { path: PathBuf, message: String },

    #[error("subscription snapshot {}: {message}", .path.display())]
    Snapshot { path: PathBuf, message: String },
}

impl CoverageError {
    pub fn billing(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Billing {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn snapshot(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Snapshot {
            path: path.into(),
            message: message.into(),
        }
    }

    /// True when the target hour could not be placed inside the billing data.
    pub fn is_range_error(&self) -> bool {
        matches!(self, Self::HourOutOfRange { .. } | Self::NoComputeUsage { .. })
    }

    /// Process exit code the CLI reports for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidTargetHour { .. } => EXIT_INVALID_ARGUMENT,
            Self::HourOutOfRange { .. } | Self::NoComputeUsage { .. } => EXIT_HOUR_OUT_OF_RANGE,
            Self::Billing { .. } | Self::Snapshot { .. } => EXIT_MALFORMED_INPUT,
        }
    }
}

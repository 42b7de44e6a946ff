//! Error taxonomy for caller-contract violations

use polars::prelude::PolarsError;

/// Errors returned when a caller violates an operation's input contract.
///
/// Numerically undefined but valid results are not errors; those are
/// reported through [`crate::Measure::Undefined`].
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("column '{column}' not found in table")]
    ColumnNotFound { column: String },

    #[error("column '{column}' has unsupported type {dtype}")]
    InvalidColumnType { column: String, dtype: String },

    #[error("column '{column}' row {row}: {reason}")]
    InvalidValue {
        column: String,
        row: usize,
        reason: String,
    },

    #[error("length mismatch: {left_name} has {left} values, {right_name} has {right}")]
    LengthMismatch {
        left_name: &'static str,
        right_name: &'static str,
        left: usize,
        right: usize,
    },

    #[error("number of clusters is {clusters}; valid values are 2 to n_samples - 1 ({samples} samples)")]
    InvalidClusterCount { clusters: usize, samples: usize },

    #[error("empty input: {what}")]
    EmptyInput { what: &'static str },

    #[error("no valid data: {reason}")]
    NoValidData { reason: &'static str },

    #[error("cluster {label} not present in table")]
    UnknownCluster { label: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

impl MetricsError {
    pub(crate) fn column_not_found(column: &str) -> Self {
        Self::ColumnNotFound {
            column: column.to_string(),
        }
    }

    pub(crate) fn invalid_value(column: &str, row: usize, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            column: column.to_string(),
            row,
            reason: reason.into(),
        }
    }
}

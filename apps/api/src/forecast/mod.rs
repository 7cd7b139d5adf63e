// Keyword rank-progression and traffic-uplift forecasting.
// Pipeline: ingest → params → (volume resolver) → progression → ctr → traffic → aggregate.
// Everything from progression onward is pure and runs inside spawn_blocking.

pub mod aggregate;
pub mod ctr;
pub mod engine;
pub mod handlers;
pub mod ingest;
pub mod models;
pub mod params;
pub mod progression;
pub mod traffic;

use thiserror::Error;

/// Input errors. Raised before any keyword is projected; nothing is partially computed.
#[derive(Debug, Error, PartialEq)]
pub enum ForecastError {
    #[error("no keyword rows were supplied")]
    EmptyRows,

    #[error("column mapping for '{field}' is missing or not present in the data")]
    MissingColumn { field: String },

    #[error("invalid parameter '{field}': {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("could not read CSV input: {0}")]
    Csv(String),
}

impl ForecastError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ForecastError::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// The offending field, when the error is attributable to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ForecastError::MissingColumn { field } => Some(field),
            ForecastError::InvalidParameter { field, .. } => Some(field),
            ForecastError::EmptyRows => Some("rows"),
            ForecastError::Csv(_) => Some("rows.csv"),
        }
    }
}

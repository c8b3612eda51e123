//! Unified error types for the agency desk.
//!
//! Arithmetic never fails; every variant here comes from validation, lookups
//! against persisted records, or external I/O (database, template, files).

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file or settings document could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description
        message: String,
    },

    /// Form input rejected before reaching the computation core
    #[error("Validation failed: {message}")]
    Validation {
        /// Human-readable description
        message: String,
    },

    /// Client lookup by id failed
    #[error("Client not found: {id}")]
    ClientNotFound {
        /// Requested client id
        id: i64,
    },

    /// Paystub lookup by id failed
    #[error("Paystub not found: {id}")]
    PaystubNotFound {
        /// Requested paystub id
        id: i64,
    },

    /// Buy order lookup by id failed
    #[error("Buy order not found: {id}")]
    BuyOrderNotFound {
        /// Requested buy order id
        id: i64,
    },

    /// Insurance policy lookup by id failed
    #[error("Insurance policy not found: {id}")]
    PolicyNotFound {
        /// Requested policy id
        id: i64,
    },

    /// The fillable form template could not be loaded, flattened or saved
    #[error("Form template error: {message}")]
    Template {
        /// Human-readable description
        message: String,
    },

    /// A single form field could not be written
    #[error("Form field '{field}' could not be written: {message}")]
    FieldWrite {
        /// Name of the field in the template
        field: String,
        /// Human-readable description
        message: String,
    },

    /// Database error from `SeaORM`
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid regular expression in the form field rules
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for building a [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

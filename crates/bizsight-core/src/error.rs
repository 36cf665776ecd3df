//! Error types for Bizsight

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Unknown {field} '{value}': not in the trained vocabulary")]
    UnknownCategory { field: String, value: String },

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No feedback record for insight '{0}'")]
    FeedbackNotFound(String),

    #[error("Feedback for insight '{0}' is already being tracked")]
    FeedbackAlreadyTracked(String),

    #[error("Feedback for insight '{0}' has already been resolved")]
    FeedbackAlreadyResolved(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Build a validation error naming the offending field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Build an unknown-category error naming the field and rejected value
    pub fn unknown_category(field: impl Into<String>, value: impl Into<String>) -> Self {
        Error::UnknownCategory {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether the caller can fix the input and retry
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Validation { .. } | Error::UnknownCategory { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

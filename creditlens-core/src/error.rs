//! Error types for CreditLens operations

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a failed backend fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The request could not complete (connect, timeout, transport).
    NetworkFailure,
    /// The backend answered with a non-2xx status or an undecodable body.
    BackendError,
    /// The response was valid but carried no usable rows.
    EmptyResult,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ErrorKind::NetworkFailure => "NetworkFailure",
            ErrorKind::BackendError => "BackendError",
            ErrorKind::EmptyResult => "EmptyResult",
        };
        write!(f, "{}", value)
    }
}

/// A fetch failure as stored in a `Failed` cache entry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: ErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkFailure, message)
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BackendError, message)
    }

    pub fn empty(what: impl fmt::Display) -> Self {
        Self::new(ErrorKind::EmptyResult, format!("no {} returned", what))
    }

    /// Message suitable for showing next to the affected view.
    pub fn user_message(&self) -> String {
        match self.kind {
            ErrorKind::NetworkFailure => {
                "Could not reach the analytics service. Try again.".to_string()
            }
            ErrorKind::BackendError => {
                format!("The analytics service returned an error: {}", self.message)
            }
            ErrorKind::EmptyResult => "No data available for the selected filters.".to_string(),
        }
    }
}

/// Result alias for backend fetches.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors raised while parsing or validating domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    #[error("Invalid date {value}: {reason}")]
    InvalidDate { value: String, reason: String },

    #[error("Unknown tab: {0}")]
    UnknownTab(String),
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

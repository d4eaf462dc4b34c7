//! Error taxonomy
//!
//! Every failure that leaves the gateway carries one of a closed set of kinds.
//! Validation errors are produced locally by the dispatcher; every other kind
//! comes out of a backend adapter and crosses the normalizer unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Closed set of error kinds surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Bad or missing action or argument; never reaches a backend
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    /// Referenced server, profile, client, key or path does not exist
    #[serde(rename = "NOT_FOUND")]
    NotFound,
    /// Operation would duplicate existing state
    #[serde(rename = "CONFLICT")]
    Conflict,
    /// Process could not be spawned or API could not be reached
    #[serde(rename = "BACKEND_UNAVAILABLE")]
    BackendUnavailable,
    /// Operation exceeded its deadline or was cancelled
    #[serde(rename = "TIMEOUT")]
    Timeout,
    /// Backend ran but reported a failure with no more specific mapping
    #[serde(rename = "BACKEND_EXECUTION")]
    BackendExecution,
}

/// Who is expected to act on an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    /// The caller asked for something invalid or absent
    User,
    /// The gateway or its backends are misbehaving
    System,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::Validation,
        ErrorKind::NotFound,
        ErrorKind::Conflict,
        ErrorKind::BackendUnavailable,
        ErrorKind::Timeout,
        ErrorKind::BackendExecution,
    ];

    /// Machine-readable code placed in normalized error results
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::BackendUnavailable => "BACKEND_UNAVAILABLE",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::BackendExecution => "BACKEND_EXECUTION",
        }
    }

    /// Parse a code produced by [`ErrorKind::code`]
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ErrorKind::Validation | ErrorKind::NotFound | ErrorKind::Conflict => ErrorClass::User,
            ErrorKind::BackendUnavailable | ErrorKind::Timeout | ErrorKind::BackendExecution => {
                ErrorClass::System
            }
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A classified gateway failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct GateError {
    kind: ErrorKind,
    message: String,
}

impl GateError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BackendUnavailable, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BackendExecution, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Prefix the message, keeping the kind
    pub fn context(self, prefix: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{}: {}", prefix, self.message),
        }
    }
}

pub type Result<T> = std::result::Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_code("SOMETHING_ELSE"), None);
    }

    #[test]
    fn test_classification() {
        assert_eq!(ErrorKind::NotFound.class(), ErrorClass::User);
        assert_eq!(ErrorKind::Conflict.class(), ErrorClass::User);
        assert_eq!(ErrorKind::BackendUnavailable.class(), ErrorClass::System);
        assert_eq!(ErrorKind::Timeout.class(), ErrorClass::System);
    }

    #[test]
    fn test_serde_uses_codes() {
        let encoded = serde_json::to_string(&ErrorKind::BackendUnavailable).unwrap();
        assert_eq!(encoded, "\"BACKEND_UNAVAILABLE\"");
    }

    #[test]
    fn test_context_keeps_kind() {
        let err = GateError::not_found("profile 'web' not found").context("profile edit");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "profile edit: profile 'web' not found");
    }
}

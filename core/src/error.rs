//! Classified errors returned by the executor.
//!
//! # Design
//! Every failed call ends up as one `ApiError` whose `kind` is drawn from a
//! closed set. Callers branch on `kind` only; the raw status stays on the
//! error for display and tracing. `details` keeps whatever the server or the
//! transport handed back and is never inspected for control flow.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Closed set of error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 400: the submitted data was rejected.
    Validation,
    /// 404
    NotFound,
    /// 409: the write conflicts with a business rule (e.g. overlapping
    /// appointments) and may be retried with an override.
    Business,
    /// 401: the session is missing or expired.
    Unauthorized,
    /// 403
    Forbidden,
    /// Any 5xx status.
    Server,
    /// No response was received: connection failure, timeout or
    /// cancellation.
    Network,
    /// Anything else.
    Unknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Business => "BUSINESS",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::Server => "SERVER",
            ErrorKind::Network => "NETWORK",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw diagnostic payload attached to an `ApiError`.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorDetails {
    /// Error body that parsed as JSON.
    Body(Value),
    /// Error body that was not JSON.
    Text(String),
    /// Description of the underlying transport or serde failure.
    Transport(String),
}

/// A classified API failure. Constructed once where the failure happens and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub code: Option<String>,
    pub message: String,
    pub details: Option<ErrorDetails>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            code: None,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: Option<String>) -> Self {
        self.code = code;
        self
    }

    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = Some(details);
        self
    }

    /// True for the 409 conflicts that the confirmation workflow can
    /// override.
    pub fn is_conflict(&self) -> bool {
        self.kind == ErrorKind::Business
    }
}

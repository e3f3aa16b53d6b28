//! Error taxonomy.
//!
//! `AdapterError` is the narrow set of failures a [`crate::adapter::StoreAdapter`]
//! is allowed to report (spec §4.2). `Error` is the public taxonomy (spec §7);
//! adapter errors pass through unchanged in code and message, never re-wrapped
//! under a generic `Internal`.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error as ThisError;

///
/// AdapterError
///
/// The complete set of failures a store adapter may report. Anything an
/// adapter needs to say that does not fit here is a bug in the adapter,
/// not a gap in this enum.
///
#[derive(Clone, Debug, ThisError)]
pub enum AdapterError {
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal: {0}")]
    Internal(String),
}

///
/// ErrorKind
///
/// Closed taxonomy from spec §7. Variants map 1:1 to an HTTP-style status
/// code via [`ErrorKind::status_code`]; the core never invents a status
/// code outside spec §6's set.
///
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Validation,
    BadRequest,
    NotFound,
    Conflict,
    PreconditionFailed,
    FailedDependency,
    NotSupported,
    ReadOnly,
    AlreadySaved,
    AlreadyConverted,
    InvalidType,
    Cancelled,
    ServiceUnavailable,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::Validation | Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::PreconditionFailed => 412,
            Self::FailedDependency => 424,
            Self::NotSupported => 405,
            Self::ReadOnly | Self::AlreadySaved | Self::AlreadyConverted | Self::InvalidType => {
                500
            }
            Self::Cancelled => 499,
            Self::ServiceUnavailable => 503,
            Self::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Validation => "validation",
            Self::BadRequest => "bad_request",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::PreconditionFailed => "precondition_failed",
            Self::FailedDependency => "failed_dependency",
            Self::NotSupported => "not_supported",
            Self::ReadOnly => "read_only",
            Self::AlreadySaved => "already_saved",
            Self::AlreadyConverted => "already_converted",
            Self::InvalidType => "invalid_type",
            Self::Cancelled => "cancelled",
            Self::ServiceUnavailable => "service_unavailable",
            Self::Internal => "internal",
        };
        write!(f, "{label}")
    }
}

///
/// Error
///
/// Public error type returned by every fallible operation in this crate.
///
#[derive(Clone, Debug, ThisError)]
#[error("{kind}: {message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub field_errors: BTreeMap<String, Vec<String>>,
}

impl Error {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field_errors: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn validation(field_errors: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: "validation failed".to_string(),
            field_errors,
        }
    }

    #[must_use]
    pub fn read_only() -> Self {
        Self::new(ErrorKind::ReadOnly, "item is read-only")
    }

    #[must_use]
    pub fn already_saved() -> Self {
        Self::new(ErrorKind::AlreadySaved, "command has already been saved")
    }

    #[must_use]
    pub fn already_converted() -> Self {
        Self::new(
            ErrorKind::AlreadyConverted,
            "read result has already been converted to a save command",
        )
    }

    #[must_use]
    pub fn not_supported(op: &str) -> Self {
        Self::new(
            ErrorKind::NotSupported,
            format!("operation '{op}' is not enabled for this provider"),
        )
    }

    #[must_use]
    pub fn invalid_type(type_name: &str) -> Self {
        Self::new(
            ErrorKind::InvalidType,
            format!("'{type_name}' is not a valid type name"),
        )
    }

    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "operation was cancelled")
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound)
    }
}

impl From<AdapterError> for Error {
    fn from(err: AdapterError) -> Self {
        let (kind, message) = match err {
            AdapterError::Conflict(m) => (ErrorKind::Conflict, m),
            AdapterError::PreconditionFailed(m) => (ErrorKind::PreconditionFailed, m),
            AdapterError::NotFound(m) => (ErrorKind::NotFound, m),
            AdapterError::BadRequest(m) => (ErrorKind::BadRequest, m),
            AdapterError::ServiceUnavailable(m) => (ErrorKind::ServiceUnavailable, m),
            AdapterError::Internal(m) => (ErrorKind::Internal, m),
        };
        Self::new(kind, message)
    }
}

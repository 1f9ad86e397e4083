//! Error types for s6-core
//!
//! Every remote failure is translated into [`Error`] exactly once, at the
//! adapter that talks to the provider. Code above that seam only ever looks
//! at [`Error::kind`] and the helpers on this type.

use serde::Serialize;
use thiserror::Error;

/// Result type alias for s6-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Flat classification tag for [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    AccessDenied,
    ObjectTooLarge,
    ObjectNotActive,
    ConsistencyTimeout,
    InvalidUri,
    TransferFailed,
    Unknown,
    /// Local filesystem failure
    Io,
    /// Local configuration problem
    Config,
    /// Interrupted by the caller
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::AlreadyExists => "AlreadyExists",
            ErrorKind::AccessDenied => "AccessDenied",
            ErrorKind::ObjectTooLarge => "ObjectTooLarge",
            ErrorKind::ObjectNotActive => "ObjectNotActive",
            ErrorKind::ConsistencyTimeout => "ConsistencyTimeout",
            ErrorKind::InvalidUri => "InvalidURI",
            ErrorKind::TransferFailed => "TransferFailed",
            ErrorKind::Unknown => "Unknown",
            ErrorKind::Io => "Io",
            ErrorKind::Config => "Config",
            ErrorKind::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the access layer
#[derive(Error, Debug)]
pub enum Error {
    /// Bucket or key does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bucket already exists, either owned by the caller or by someone else
    #[error("{}", already_exists_message(.resource, .owned_by_you))]
    AlreadyExists { resource: String, owned_by_you: bool },

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Object too large: {0}")]
    ObjectTooLarge(String),

    /// Source object lives in an archival tier and cannot be copied directly
    #[error("Object not in active tier: {0}")]
    ObjectNotActive(String),

    /// A mutation was accepted but never became observable in time
    #[error("Timed out waiting for {0}")]
    ConsistencyTimeout(String),

    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// Transport or service failure while moving object data
    #[error("Transfer failed: {message}")]
    TransferFailed {
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Service error without a more specific classification
    #[error("{}", unknown_message(.code, .message))]
    Unknown {
        code: Option<String>,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,
}

fn already_exists_message(resource: &str, owned_by_you: &bool) -> String {
    if *owned_by_you {
        format!("Already exists: {resource} (owned by you)")
    } else {
        format!("Already exists: {resource}")
    }
}

fn unknown_message(code: &Option<String>, message: &str) -> String {
    match code {
        Some(code) => format!("Service error ({code}): {message}"),
        None => format!("Service error: {message}"),
    }
}

impl Error {
    /// Classification tag for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Error::AccessDenied(_) => ErrorKind::AccessDenied,
            Error::ObjectTooLarge(_) => ErrorKind::ObjectTooLarge,
            Error::ObjectNotActive(_) => ErrorKind::ObjectNotActive,
            Error::ConsistencyTimeout(_) => ErrorKind::ConsistencyTimeout,
            Error::InvalidUri(_) => ErrorKind::InvalidUri,
            Error::TransferFailed { .. } => ErrorKind::TransferFailed,
            Error::Unknown { .. } => ErrorKind::Unknown,
            Error::Io(_) => ErrorKind::Io,
            Error::Config(_) => ErrorKind::Config,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether the condition describes a state that is already true
    ///
    /// `create_bucket` reports an existing bucket this way so callers can
    /// tell it apart from fatal failures such as an invalid region.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::AlreadyExists { .. })
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Wrap a failure that happened while moving object data
    pub fn transfer_failed(message: impl Into<String>, source: Error) -> Self {
        Error::TransferFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Equivalent error with the same variant and message
    ///
    /// Used when one failure has to be reported against several keys.
    pub fn duplicate(&self) -> Self {
        match self {
            Error::NotFound(s) => Error::NotFound(s.clone()),
            Error::AlreadyExists {
                resource,
                owned_by_you,
            } => Error::AlreadyExists {
                resource: resource.clone(),
                owned_by_you: *owned_by_you,
            },
            Error::AccessDenied(s) => Error::AccessDenied(s.clone()),
            Error::ObjectTooLarge(s) => Error::ObjectTooLarge(s.clone()),
            Error::ObjectNotActive(s) => Error::ObjectNotActive(s.clone()),
            Error::ConsistencyTimeout(s) => Error::ConsistencyTimeout(s.clone()),
            Error::InvalidUri(s) => Error::InvalidUri(s.clone()),
            Error::TransferFailed { message, source } => Error::TransferFailed {
                message: message.clone(),
                source: source.as_deref().map(|e| Box::new(e.duplicate())),
            },
            Error::Unknown { code, message } => Error::Unknown {
                code: code.clone(),
                message: message.clone(),
            },
            Error::Io(e) => Error::Io(std::io::Error::new(e.kind(), e.to_string())),
            Error::Config(s) => Error::Config(s.clone()),
            Error::Cancelled => Error::Cancelled,
        }
    }

    /// Service error code, when the provider supplied one
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Unknown { code, .. } => code.as_deref(),
            Error::TransferFailed {
                source: Some(source),
                ..
            } => source.code(),
            _ => None,
        }
    }
}

//! Process exit codes
//!
//! Scripts branch on these, so the numeric values are stable.

use s6_core::{Error, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    /// Bad arguments, malformed URI or unusable config
    UsageError = 2,
    /// Transport or transfer failure, local I/O included
    NetworkError = 3,
    AuthError = 4,
    NotFound = 5,
    /// Bucket name taken by someone else
    Conflict = 6,
    /// Mutation not confirmed before the deadline
    ConsistencyTimeout = 7,
    Interrupted = 130,
}

impl ExitCode {
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::AlreadyExists {
                owned_by_you: false,
                ..
            } => return ExitCode::Conflict,
            Error::AlreadyExists { .. } => return ExitCode::GeneralError,
            // Report what actually broke, not the transfer wrapper
            Error::TransferFailed {
                source: Some(cause),
                ..
            } => return ExitCode::from_error(cause),
            _ => {}
        }

        match error.kind() {
            ErrorKind::InvalidUri | ErrorKind::Config => ExitCode::UsageError,
            ErrorKind::TransferFailed | ErrorKind::Io => ExitCode::NetworkError,
            ErrorKind::AccessDenied => ExitCode::AuthError,
            ErrorKind::NotFound => ExitCode::NotFound,
            ErrorKind::ConsistencyTimeout => ExitCode::ConsistencyTimeout,
            ErrorKind::Cancelled => ExitCode::Interrupted,
            ErrorKind::AlreadyExists
            | ErrorKind::ObjectTooLarge
            | ErrorKind::ObjectNotActive
            | ErrorKind::Unknown => ExitCode::GeneralError,
        }
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Success
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

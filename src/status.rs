//! Native status codes and their classification.
//!
//! Every status returned by a registry primitive goes through [`raise_if_error`]
//! (or [`CheckStatus::check`], which forwards to it) before the result is
//! treated as a success.

use crate::error::{RegistryError, Result};
use std::fmt;

/// `ERROR_SUCCESS`.
pub const ERROR_SUCCESS: u32 = 0;
/// `ERROR_FILE_NOT_FOUND`: the key or value does not exist.
pub const ERROR_FILE_NOT_FOUND: u32 = 2;
/// `ERROR_ACCESS_DENIED`.
pub const ERROR_ACCESS_DENIED: u32 = 5;
/// `ERROR_INVALID_HANDLE`.
pub const ERROR_INVALID_HANDLE: u32 = 6;
/// `ERROR_CALL_NOT_IMPLEMENTED`.
pub const ERROR_CALL_NOT_IMPLEMENTED: u32 = 120;
/// `ERROR_MORE_DATA`: the supplied buffer was too small.
pub const ERROR_MORE_DATA: u32 = 234;
/// `ERROR_NO_MORE_ITEMS`: enumeration index past the last element.
pub const ERROR_NO_MORE_ITEMS: u32 = 259;
/// `ERROR_KEY_DELETED`: the key behind an open handle was deleted.
pub const ERROR_KEY_DELETED: u32 = 1018;

/// Raw result of a native primitive. The error arm is the native status code.
pub type NativeResult<T> = std::result::Result<T, u32>;

/// Classified native status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// The call succeeded.
    Success,
    /// Node or value absent.
    FileNotFound,
    /// Insufficient privilege.
    AccessDenied,
    /// Hive or node invalid for this platform.
    InvalidHandle,
    /// Operation unsupported for this hive on this platform.
    CallNotImplemented,
    /// Any code without a dedicated kind.
    Other(u32),
}

impl Status {
    const KNOWN: [Status; 5] = [
        Status::Success,
        Status::FileNotFound,
        Status::AccessDenied,
        Status::InvalidHandle,
        Status::CallNotImplemented,
    ];

    /// Classifies a native status code. Total: unknown codes become [`Status::Other`].
    pub fn classify(code: u32) -> Self {
        Self::known(code).unwrap_or(Status::Other(code))
    }

    /// Strict lookup: returns `None` for codes without a dedicated kind.
    pub fn known(code: u32) -> Option<Self> {
        Self::KNOWN.iter().copied().find(|status| status.code() == code)
    }

    /// Raw native code.
    pub fn code(&self) -> u32 {
        match self {
            Status::Success => ERROR_SUCCESS,
            Status::FileNotFound => ERROR_FILE_NOT_FOUND,
            Status::AccessDenied => ERROR_ACCESS_DENIED,
            Status::InvalidHandle => ERROR_INVALID_HANDLE,
            Status::CallNotImplemented => ERROR_CALL_NOT_IMPLEMENTED,
            Status::Other(code) => *code,
        }
    }

    /// Lowercase hexadecimal code without prefix.
    pub fn hex_code(&self) -> String {
        format!("{:x}", self.code())
    }

    /// Human readable description, `None` for unmapped codes.
    pub fn description(&self) -> Option<&'static str> {
        match self {
            Status::Success => Some("OK"),
            Status::FileNotFound => Some("Path is not found"),
            Status::AccessDenied => Some("Access denied"),
            Status::InvalidHandle => Some("Invalid handle"),
            Status::CallNotImplemented => Some("Not implemented"),
            Status::Other(_) => None,
        }
    }

    /// Symbolic name of the status.
    pub fn name(&self) -> &'static str {
        match self {
            Status::Success => "SUCCESS",
            Status::FileNotFound => "FILE_NOT_FOUND",
            Status::AccessDenied => "ACCESS_DENIED",
            Status::InvalidHandle => "INVALID_HANDLE",
            Status::CallNotImplemented => "CALL_NOT_IMPLEMENTED",
            Status::Other(_) => "UNKNOWN",
        }
    }

    /// Returns true for [`Status::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.hex_code())?;
        if let Some(description) = self.description() {
            write!(f, ": {}", description)?;
        }
        Ok(())
    }
}

/// Fails with the classified error kind unless `code` is `ERROR_SUCCESS`.
///
/// The message contains `context`, the status description when the code is
/// known, and the raw code in decimal and hexadecimal.
pub fn raise_if_error(code: u32, context: &str) -> Result<()> {
    match Status::classify(code) {
        Status::Success => Ok(()),
        status => Err(error_for(status, context)),
    }
}

fn error_for(status: Status, context: &str) -> RegistryError {
    let code = status.code();
    let message = match status.description() {
        Some(description) => format!("{}: {} ({}, {:#x})", context, description, code, code),
        None => format!("{} ({}, {:#x})", context, code, code),
    };

    match status {
        Status::FileNotFound => RegistryError::NotFound { message, code },
        Status::AccessDenied => RegistryError::PermissionDenied { message, code },
        Status::InvalidHandle => RegistryError::InvalidTarget { message, code },
        Status::CallNotImplemented => RegistryError::Unsupported { message, code },
        Status::Success | Status::Other(_) => RegistryError::NativeFailure { message, code },
    }
}

/// Routes a [`NativeResult`] through [`raise_if_error`].
pub trait CheckStatus<T> {
    /// Converts the raw status into a typed result annotated with `context`.
    fn check(self, context: impl FnOnce() -> String) -> Result<T>;
}

impl<T> CheckStatus<T> for NativeResult<T> {
    fn check(self, context: impl FnOnce() -> String) -> Result<T> {
        match self {
            Ok(value) => Ok(value),
            Err(code) => {
                let context = context();
                raise_if_error(code, &context)?;
                // A backend reported ERROR_SUCCESS through the error arm.
                Err(error_for(Status::Other(code), &context))
            }
        }
    }
}

//! Error types for registry operations.
//!
//! Each native failure is classified into one of five kinds (see
//! [`crate::status`]). The composed message carries the attempted hive and
//! path, the status description when known, and the raw code.

use crate::status::Status;
use std::io;
use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur during registry access.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Key or value absent.
    #[error("{message}")]
    NotFound {
        /// Composed message.
        message: String,
        /// Raw native status.
        code: u32,
    },

    /// Operation forbidden for the current privilege level.
    #[error("{message}")]
    PermissionDenied {
        /// Composed message.
        message: String,
        /// Raw native status.
        code: u32,
    },

    /// Hive invalid on this platform or version.
    #[error("{message}")]
    InvalidTarget {
        /// Composed message.
        message: String,
        /// Raw native status.
        code: u32,
    },

    /// Operation not implemented for this hive.
    #[error("{message}")]
    Unsupported {
        /// Composed message.
        message: String,
        /// Raw native status.
        code: u32,
    },

    /// Any other non-zero native status.
    #[error("{message}")]
    NativeFailure {
        /// Composed message.
        message: String,
        /// Raw native status.
        code: u32,
    },

    /// The native registry entry points could not be resolved.
    #[error("Native registry API unavailable: {0}")]
    Unavailable(String),
}

impl RegistryError {
    /// Creates a native failure that did not come from a status code.
    ///
    /// # Arguments
    ///
    /// * `message` - Description of the failure
    /// * `code` - Raw status the failure is attributed to
    pub fn native_failure(message: String, code: u32) -> Self {
        Self::NativeFailure { message, code }
    }

    /// Raw native status code, if the error came from one.
    pub fn code(&self) -> Option<u32> {
        match self {
            Self::NotFound { code, .. }
            | Self::PermissionDenied { code, .. }
            | Self::InvalidTarget { code, .. }
            | Self::Unsupported { code, .. }
            | Self::NativeFailure { code, .. } => Some(*code),
            Self::Unavailable(_) => None,
        }
    }

    /// Classified status of the raw code.
    pub fn status(&self) -> Option<Status> {
        self.code().map(Status::classify)
    }

    /// Returns true for [`RegistryError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<RegistryError> for io::Error {
    fn from(err: RegistryError) -> Self {
        let kind = match &err {
            RegistryError::NotFound { .. } => io::ErrorKind::NotFound,
            RegistryError::PermissionDenied { .. } => io::ErrorKind::PermissionDenied,
            RegistryError::InvalidTarget { .. } => io::ErrorKind::InvalidInput,
            RegistryError::Unsupported { .. } | RegistryError::Unavailable(_) => {
                io::ErrorKind::Unsupported
            }
            RegistryError::NativeFailure { .. } => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_and_status() {
        let err = RegistryError::PermissionDenied {
            message: "denied".to_string(),
            code: 5,
        };
        assert_eq!(err.code(), Some(5));
        assert_eq!(err.status(), Some(Status::AccessDenied));

        let err = RegistryError::Unavailable("advapi32.dll".to_string());
        assert_eq!(err.code(), None);
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_into_io_error() {
        let err: io::Error = RegistryError::NotFound {
            message: "Cannot open key HKEY_LOCAL_MACHINE\\DoesNotExist".to_string(),
            code: 2,
        }
        .into();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(err.to_string().contains("DoesNotExist"));

        let err: io::Error = RegistryError::native_failure("boom".to_string(), 1018).into();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }
}

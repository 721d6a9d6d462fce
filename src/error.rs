//! Error types for registry operations.
//!
//! Every failure surfaced by this crate is one [`RegistryError`] variant, so
//! callers can tell "missing" from "cannot access" from "malformed input"
//! without inspecting messages.

use std::io;
use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Native code reported for an operation on a released or unknown handle.
pub const ERROR_INVALID_HANDLE: u32 = 6;

/// Native code reported for an operation on a key deleted while open.
pub const ERROR_KEY_DELETED: u32 = 1018;

/// Errors that can occur during registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Path text could not be tokenized (empty, or an unknown root alias).
    #[error("Malformed path: {0}")]
    MalformedPath(String),

    /// Key or value not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Insufficient privilege or an exclusive-access conflict.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Non-recursive delete attempted on a key that still has subkeys.
    #[error("Key not empty: {0}")]
    NotEmpty(String),

    /// Native value has no registry type, or does not fit the requested one.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// Operation attempted on a key that is not currently open.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Any other backend-reported failure.
    #[error("OS error {code}: {message}")]
    Os {
        /// Native error code.
        code: u32,
        /// Backend diagnostic message.
        message: String,
    },

    /// Stored data is shorter than its declared type requires.
    #[error("Truncated data: expected {expected} bytes, got {actual} bytes")]
    TruncatedData {
        /// Bytes required by the value type.
        expected: usize,
        /// Bytes actually stored.
        actual: usize,
    },

    /// Stored string data is not valid UTF-16LE.
    #[error("Invalid UTF-16 string data")]
    InvalidUtf16,

    /// Native value cannot be represented under its registry type.
    #[error("Invalid value data: {0}")]
    InvalidData(String),

    /// I/O error while writing a tree dump.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Subtree snapshot could not be converted to or from JSON.
    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RegistryError {
    /// Creates a not found error with context about what was being searched.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use regkit::error::RegistryError;
    /// let err = RegistryError::not_found("value", "DisplayName");
    /// assert!(err.is_not_found());
    /// ```
    pub fn not_found(item_type: &str, name: &str) -> Self {
        Self::NotFound(format!("{} '{}'", item_type, name))
    }

    /// Creates a malformed path error.
    pub fn malformed_path(message: impl Into<String>) -> Self {
        Self::MalformedPath(message.into())
    }

    /// Creates an invalid state error for an operation on a key that is not open.
    pub fn not_open(path: &str) -> Self {
        Self::InvalidState(format!("key '{}' is not open", path))
    }

    /// Creates a backend failure with a native code.
    pub fn os(code: u32, message: impl Into<String>) -> Self {
        Self::Os {
            code,
            message: message.into(),
        }
    }

    /// Returns true for the absent-key/absent-value kind.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true for the access-denied kind.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied(_))
    }
}

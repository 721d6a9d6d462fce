//! Backend contract for concrete registry providers.
//!
//! All I/O crosses the [`Backend`] trait. A native provider translates these
//! calls into OS registry calls and maps native error codes onto
//! [`RegistryError`](crate::RegistryError); [`MemoryBackend`](crate::MemoryBackend)
//! reproduces the same observable behaviour in memory. Callers may rely on
//! nothing beyond what is documented here.

use crate::error::Result;
use crate::path::KeyPath;
use crate::value::ValueEntry;
use chrono::{DateTime, Utc};
use std::fmt;

/// Access requested when opening a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessMode {
    /// Query values and enumerate subkeys.
    #[default]
    Read,

    /// Read access plus value mutation and subkey creation.
    Write,
}

impl AccessMode {
    /// Returns true if the mode permits mutation.
    pub fn can_write(&self) -> bool {
        matches!(self, AccessMode::Write)
    }
}

/// Opaque identifier of an open backend handle.
///
/// Identifiers are never reused by a backend instance, so a released handle
/// cannot alias a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Metadata of an open key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    /// Number of direct subkeys.
    pub subkey_count: usize,

    /// Number of values, including the default value if set.
    pub value_count: usize,

    /// Last time the key, its values or its direct children changed.
    pub last_written: DateTime<Utc>,
}

/// A concrete registry provider.
///
/// Implementations must be shareable across threads; every method takes
/// `&self` and synchronizes internally.
pub trait Backend: Send + Sync {
    /// Opens the key at `path`, creating it and any missing ancestors when
    /// `create` is true.
    ///
    /// # Errors
    ///
    /// * `NotFound` if the key is absent and `create` is false.
    /// * `AccessDenied` on insufficient privilege.
    /// * `Os` for any other backend failure.
    fn open_key(&self, path: &KeyPath, mode: AccessMode, create: bool) -> Result<HandleId>;

    /// Releases a handle. Idempotent and infallible: failures are logged,
    /// never raised, so cleanup can always run.
    fn close_key(&self, handle: HandleId);

    /// Deletes the key at `path`.
    ///
    /// # Errors
    ///
    /// * `NotFound` if the key is absent.
    /// * `NotEmpty` if the key has subkeys.
    /// * `AccessDenied` for roots and protected keys.
    fn delete_key(&self, path: &KeyPath) -> Result<()>;

    /// Lists direct subkey names in backend order.
    fn enumerate_subkey_names(&self, handle: HandleId) -> Result<Vec<String>>;

    /// Lists value names in backend order; the default value appears as `""`.
    fn enumerate_value_names(&self, handle: HandleId) -> Result<Vec<String>>;

    /// Reads a value.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the named value is absent.
    fn get_value(&self, handle: HandleId, name: &str) -> Result<ValueEntry>;

    /// Creates or overwrites a value.
    fn set_value(&self, handle: HandleId, entry: ValueEntry) -> Result<()>;

    /// Deletes a value.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the named value is absent.
    fn delete_value(&self, handle: HandleId, name: &str) -> Result<()>;

    /// Returns counts and last-write time of an open key.
    fn query_info(&self, handle: HandleId) -> Result<KeyInfo>;
}

//! Registry keys: path descriptor plus scoped handle lifecycle.
//!
//! A [`Key`] is built without any I/O. Opening it (`open`, `create`,
//! `open_with`) acquires a backend handle and returns a *new* opened `Key`;
//! the handle is released by [`Key::close`] or when the opened key is
//! dropped, whichever comes first, so every exit path of the caller's scope
//! releases it.
//!
//! ```text
//! Unopened --open--> Opened --close/drop--> Closed
//!    ^                                         |
//!    +------------- open again ----------------+  (new instance)
//! ```

use crate::backend::{AccessMode, Backend, HandleId, KeyInfo};
use crate::error::{RegistryError, Result};
use crate::path::KeyPath;
use crate::value::{decode, encode, Value, ValueEntry, ValueType};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Options controlling how a key is opened, in the style of
/// [`std::fs::OpenOptions`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    write: bool,
    create: bool,
}

impl OpenOptions {
    /// Read-only, no creation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests write access.
    pub fn write(&mut self, write: bool) -> &mut Self {
        self.write = write;
        self
    }

    /// Creates the key (and missing ancestors) if absent. Creation always
    /// opens for writing.
    pub fn create(&mut self, create: bool) -> &mut Self {
        self.create = create;
        self
    }

    /// Access mode the options resolve to.
    pub fn access_mode(&self) -> AccessMode {
        if self.write || self.create {
            AccessMode::Write
        } else {
            AccessMode::Read
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyState {
    Unopened,
    Opened { handle: HandleId, mode: AccessMode },
    Closed,
}

/// A key in the registry tree.
///
/// Keys compare, order and hash by path, ignoring case.
pub struct Key {
    backend: Arc<dyn Backend>,
    path: KeyPath,
    state: KeyState,
}

impl Key {
    pub(crate) fn new(backend: Arc<dyn Backend>, path: KeyPath) -> Self {
        Self {
            backend,
            path,
            state: KeyState::Unopened,
        }
    }

    pub(crate) fn backend(&self) -> Arc<dyn Backend> {
        Arc::clone(&self.backend)
    }

    /// Returns the full path.
    pub fn path(&self) -> &KeyPath {
        &self.path
    }

    /// Returns the last path part (the root alias for a root key).
    pub fn name(&self) -> &str {
        self.path.name()
    }

    /// Returns `(root, segment, ...)` as text.
    pub fn parts(&self) -> Vec<&str> {
        self.path.parts()
    }

    /// Returns true for a root key.
    pub fn is_root(&self) -> bool {
        self.path.is_root()
    }

    /// Returns true while a handle is held.
    pub fn is_open(&self) -> bool {
        matches!(self.state, KeyState::Opened { .. })
    }

    /// Returns the access mode of the held handle, if any.
    pub fn mode(&self) -> Option<AccessMode> {
        match self.state {
            KeyState::Opened { mode, .. } => Some(mode),
            _ => None,
        }
    }

    /// Returns the unopened lexical parent, or `None` for a root.
    pub fn parent(&self) -> Option<Key> {
        self.path.parent().map(|path| self.sibling(path))
    }

    /// Returns unopened lexical ancestors, nearest first, ending at the root.
    pub fn parents(&self) -> impl Iterator<Item = Key> + '_ {
        self.path.parents().map(move |path| self.sibling(path))
    }

    /// Returns an unopened key below this one. `path` may hold several
    /// segments. No I/O, no existence check.
    pub fn subkey(&self, path: &str) -> Key {
        self.sibling(self.path.append([path]))
    }

    /// Returns an unopened key below this one, one item per segment group.
    pub fn join<I, S>(&self, segments: I) -> Key
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.sibling(self.path.append(segments))
    }

    /// Returns an unopened copy of this key.
    pub fn dup(&self) -> Key {
        self.sibling(self.path.clone())
    }

    fn sibling(&self, path: KeyPath) -> Key {
        Key::new(Arc::clone(&self.backend), path)
    }

    /// Opens this key for reading.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the key does not exist.
    pub fn open(&self) -> Result<Key> {
        self.open_with(&OpenOptions::new())
    }

    /// Opens this key for writing, creating it if absent. Creating an
    /// existing key is a normal open.
    pub fn create(&self) -> Result<Key> {
        self.open_with(OpenOptions::new().write(true).create(true))
    }

    /// Opens this key with explicit options and returns the opened key;
    /// `self` is left unchanged.
    #[instrument(skip(self, options), fields(path = %self.path))]
    pub fn open_with(&self, options: &OpenOptions) -> Result<Key> {
        let mode = options.access_mode();
        let handle = self.backend.open_key(&self.path, mode, options.create)?;
        debug!(%handle, ?mode, "Acquired handle");

        let mut key = self.dup();
        key.state = KeyState::Opened { handle, mode };
        Ok(key)
    }

    /// Opens the key at `path` below this one.
    pub fn open_subkey(&self, path: &str, options: &OpenOptions) -> Result<Key> {
        self.subkey(path).open_with(options)
    }

    /// Creates (or opens for writing) the key at `path` below this one.
    pub fn create_subkey(&self, path: &str) -> Result<Key> {
        self.subkey(path).create()
    }

    /// Reports whether the key exists by attempting a read-mode open.
    ///
    /// # Errors
    ///
    /// Only absence maps to `false`; any other failure, such as
    /// `AccessDenied`, is returned as an error.
    pub fn exists(&self) -> Result<bool> {
        match self.backend.open_key(&self.path, AccessMode::Read, false) {
            Ok(handle) => {
                self.backend.close_key(handle);
                Ok(true)
            }
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Releases the held handle. No-op if the key was never opened or is
    /// already closed.
    pub fn close(&mut self) {
        if let KeyState::Opened { handle, .. } = self.state {
            self.state = KeyState::Closed;
            self.backend.close_key(handle);
            debug!(%handle, path = %self.path, "Released handle");
        }
    }

    fn handle(&self) -> Result<HandleId> {
        match self.state {
            KeyState::Opened { handle, .. } => Ok(handle),
            KeyState::Unopened => Err(RegistryError::not_open(&self.path.to_string())),
            KeyState::Closed => Err(RegistryError::InvalidState(format!(
                "key '{}' is closed",
                self.path
            ))),
        }
    }

    /// Returns subkey/value counts and the last-write time.
    pub fn info(&self) -> Result<KeyInfo> {
        self.backend.query_info(self.handle()?)
    }

    /// Reads the stored form of a value.
    pub fn get_raw(&self, name: &str) -> Result<ValueEntry> {
        self.backend.get_value(self.handle()?, name)
    }

    /// Reads a value and its type.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the value is absent.
    pub fn get_typed(&self, name: &str) -> Result<(Value, ValueType)> {
        let entry = self.get_raw(name)?;
        trace!(name, value_type = %entry.value_type, "Read value");
        Ok((decode(&entry)?, entry.value_type))
    }

    /// Reads a value. `""` addresses the default value.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the value is absent.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.get_typed(name).map(|(value, _)| value)
    }

    /// Reads a value, falling back to `default` when it is absent. Other
    /// failures are still returned.
    pub fn get_or(&self, name: &str, default: impl Into<Value>) -> Result<Value> {
        match self.get(name) {
            Err(err) if err.is_not_found() => Ok(default.into()),
            other => other,
        }
    }

    /// Writes a value with an explicit type.
    pub fn set_typed(&self, name: &str, value: impl Into<Value>, value_type: ValueType) -> Result<()> {
        let entry = encode(name, &value.into(), Some(value_type))?;
        self.set_raw(entry)
    }

    /// Writes a value, inferring its type from the value's shape.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedType` if no type can be inferred.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let entry = encode(name, &value.into(), None)?;
        self.set_raw(entry)
    }

    /// Writes a value in stored form.
    pub fn set_raw(&self, entry: ValueEntry) -> Result<()> {
        let handle = self.handle()?;
        trace!(name = %entry.name, value_type = %entry.value_type, "Writing value");
        self.backend.set_value(handle, entry)
    }

    /// Deletes a value.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the value is absent.
    pub fn delete_value(&self, name: &str) -> Result<()> {
        self.backend.delete_value(self.handle()?, name)
    }

    /// Snapshot of the value names; the default value appears as `""`.
    pub fn keys(&self) -> Result<std::vec::IntoIter<String>> {
        Ok(self.value_names()?.into_iter())
    }

    /// Value names as a vector.
    pub fn value_names(&self) -> Result<Vec<String>> {
        self.backend.enumerate_value_names(self.handle()?)
    }

    /// Direct subkey names.
    pub fn subkey_names(&self) -> Result<Vec<String>> {
        self.backend.enumerate_subkey_names(self.handle()?)
    }

    /// Lazily reads `(name, value, type)` for each name in a fresh snapshot.
    ///
    /// Values removed after the snapshot are skipped.
    pub fn items_typed(&self) -> Result<ItemsTyped<'_>> {
        Ok(ItemsTyped {
            key: self,
            names: self.value_names()?.into_iter(),
        })
    }

    /// Lazily reads `(name, value)` pairs.
    pub fn items(&self) -> Result<impl Iterator<Item = Result<(String, Value)>> + '_> {
        Ok(self
            .items_typed()?
            .map(|item| item.map(|(name, value, _)| (name, value))))
    }

    /// Lazily reads values.
    pub fn values(&self) -> Result<impl Iterator<Item = Result<Value>> + '_> {
        Ok(self.items_typed()?.map(|item| item.map(|(_, value, _)| value)))
    }

    /// Lazily reads `(value, type)` pairs.
    pub fn values_typed(&self) -> Result<impl Iterator<Item = Result<(Value, ValueType)>> + '_> {
        Ok(self
            .items_typed()?
            .map(|item| item.map(|(_, value, value_type)| (value, value_type))))
    }

    /// Deletes this key.
    ///
    /// With `recursive` the whole subtree is removed bottom-up, every
    /// descendant before its ancestor. Handles still open on deleted keys
    /// become stale.
    ///
    /// # Errors
    ///
    /// * `NotFound` if the key does not exist.
    /// * `NotEmpty` if it has subkeys and `recursive` is false; nothing is
    ///   removed in that case.
    #[instrument(skip(self), fields(path = %self.path))]
    pub fn delete(&self, recursive: bool) -> Result<()> {
        if !recursive {
            return self.backend.delete_key(&self.path);
        }
        for entry in self.walk().top_down(false) {
            let entry = entry?;
            self.backend.delete_key(entry.key.path())?;
        }
        Ok(())
    }
}

impl Drop for Key {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            KeyState::Unopened => "unopened",
            KeyState::Opened { .. } => "open",
            KeyState::Closed => "closed",
        };
        write!(f, "Key<{} {}>", self.path, state)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.path, f)
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path.cmp(&other.path)
    }
}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

/// Lazy iterator over the values of an open key.
///
/// Produced by [`Key::items_typed`]; each call takes its own name snapshot.
pub struct ItemsTyped<'a> {
    key: &'a Key,
    names: std::vec::IntoIter<String>,
}

impl<'a> Iterator for ItemsTyped<'a> {
    type Item = Result<(String, Value, ValueType)>;

    fn next(&mut self) -> Option<Self::Item> {
        for name in self.names.by_ref() {
            match self.key.get_typed(&name) {
                Ok((value, value_type)) => return Some(Ok((name, value, value_type))),
                Err(err) if err.is_not_found() => {
                    trace!(name = %name, "Value vanished after enumeration");
                }
                Err(err) => return Some(Err(err)),
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.names.len()))
    }
}

//! Registry entry point with an injected backend.

use crate::backend::Backend;
use crate::error::{RegistryError, Result};
use crate::key::Key;
use crate::memory::MemoryBackend;
use crate::path::KeyPath;
use crate::root::RootToken;
use std::fmt;
use std::sync::Arc;

/// Entry point for building [`Key`]s against one backend.
///
/// The backend is chosen by injection; nothing in this crate inspects which
/// implementation it is talking to. Cloning a `Registry` shares the backend.
///
/// # Examples
///
/// ```rust
/// use regkit::Registry;
///
/// # fn main() -> regkit::Result<()> {
/// let registry = Registry::in_memory();
/// let app = registry.current_user().create_subkey("Software\\App")?;
/// app.set("name", "regkit")?;
/// assert_eq!(app.get("name")?.as_str(), Some("regkit"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Registry {
    backend: Arc<dyn Backend>,
}

impl Registry {
    /// Creates a registry over the given backend.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Creates a registry over a fresh [`MemoryBackend`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Returns the shared backend.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Returns the unopened key of a root.
    pub fn root(&self, root: RootToken) -> Key {
        Key::new(Arc::clone(&self.backend), KeyPath::from_root(root))
    }

    /// Returns the unopened `HKEY_CLASSES_ROOT` key.
    pub fn classes_root(&self) -> Key {
        self.root(RootToken::ClassesRoot)
    }

    /// Returns the unopened `HKEY_CURRENT_USER` key.
    pub fn current_user(&self) -> Key {
        self.root(RootToken::CurrentUser)
    }

    /// Returns the unopened `HKEY_LOCAL_MACHINE` key.
    pub fn local_machine(&self) -> Key {
        self.root(RootToken::LocalMachine)
    }

    /// Returns the unopened `HKEY_USERS` key.
    pub fn users(&self) -> Key {
        self.root(RootToken::Users)
    }

    /// Returns the unopened `HKEY_CURRENT_CONFIG` key.
    pub fn current_config(&self) -> Key {
        self.root(RootToken::CurrentConfig)
    }

    /// Returns the unopened key at a full path such as `HKCU\Software\App`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::MalformedPath`] if the text does not parse or
    /// does not start with a root.
    pub fn key(&self, path: &str) -> Result<Key> {
        self.key_at(KeyPath::parse(path)?)
    }

    /// Returns the unopened key for already-tokenized parts; the first part
    /// must be a root alias.
    pub fn key_from_parts<I, S>(&self, parts: I) -> Result<Key>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.key_at(KeyPath::from_parts(parts)?)
    }

    /// Returns the unopened key at an anchored path.
    pub fn key_at(&self, path: KeyPath) -> Result<Key> {
        if path.root().is_none() {
            return Err(RegistryError::malformed_path(format!(
                "path '{}' does not start with a registry root",
                path
            )));
        }
        Ok(Key::new(Arc::clone(&self.backend), path))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_factories() {
        let registry = Registry::in_memory();
        assert_eq!(registry.current_user().path().to_string(), "HKCU");
        assert_eq!(registry.local_machine().path().to_string(), "HKLM");
        assert_eq!(registry.classes_root().path().to_string(), "HKCR");
        assert_eq!(registry.users().path().to_string(), "HKU");
        assert_eq!(registry.current_config().path().to_string(), "HKCC");
    }

    #[test]
    fn test_key_requires_root() {
        let registry = Registry::in_memory();
        assert!(registry.key("HKEY_LOCAL_MACHINE\\Software").is_ok());
        assert!(matches!(
            registry.key("Software\\App"),
            Err(RegistryError::MalformedPath(_))
        ));
        assert!(matches!(registry.key(""), Err(RegistryError::MalformedPath(_))));
    }

    #[test]
    fn test_key_from_parts() {
        let registry = Registry::in_memory();
        let key = registry.key_from_parts(["HKCU", "Software", "App"]).unwrap();
        assert_eq!(key.path().to_string(), "HKCU\\Software\\App");
        assert!(registry.key_from_parts(["HKEY_BOGUS"]).is_err());
    }
}

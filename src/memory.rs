//! In-memory registry backend.
//!
//! [`MemoryBackend`] keeps one tree per root behind a single `RwLock` and
//! reproduces the observable behaviour of the native registry: error kinds,
//! case-insensitive and case-preserving names, the default value addressed
//! as `""`, refusal to delete non-empty keys, and write access checks on
//! handles.

use crate::backend::{AccessMode, Backend, HandleId, KeyInfo};
use crate::error::{RegistryError, Result, ERROR_INVALID_HANDLE, ERROR_KEY_DELETED};
use crate::path::KeyPath;
use crate::root::RootToken;
use crate::utils::fold_case;
use crate::value::ValueEntry;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, instrument, trace, warn};

/// A key stored in memory.
#[derive(Debug)]
struct Node {
    /// Unique per created key; a recreated key gets a new one.
    id: u64,

    /// Name with the case it was created with.
    name: String,

    /// Values keyed by folded name.
    values: BTreeMap<String, ValueEntry>,

    /// Children keyed by folded name.
    children: BTreeMap<String, Node>,

    last_written: DateTime<Utc>,
}

impl Node {
    fn new(id: u64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            values: BTreeMap::new(),
            children: BTreeMap::new(),
            last_written: Utc::now(),
        }
    }

    fn touch(&mut self) {
        self.last_written = Utc::now();
    }
}

/// State behind an open handle.
#[derive(Debug, Clone)]
struct OpenHandle {
    path: KeyPath,
    node_id: u64,
    mode: AccessMode,
}

#[derive(Debug)]
struct State {
    roots: HashMap<RootToken, Node>,
    handles: HashMap<HandleId, OpenHandle>,
    denied: Vec<KeyPath>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn node(&self, path: &KeyPath) -> Result<Option<&Node>> {
        let root = rooted(path)?;
        let mut node = match self.roots.get(&root) {
            Some(node) => node,
            None => return Ok(None),
        };
        for segment in path.segments() {
            match node.children.get(&fold_case(segment)) {
                Some(child) => node = child,
                None => return Ok(None),
            }
        }
        Ok(Some(node))
    }

    fn node_mut(&mut self, path: &KeyPath) -> Result<Option<&mut Node>> {
        let root = rooted(path)?;
        let mut node = match self.roots.get_mut(&root) {
            Some(node) => node,
            None => return Ok(None),
        };
        for segment in path.segments() {
            match node.children.get_mut(&fold_case(segment)) {
                Some(child) => node = child,
                None => return Ok(None),
            }
        }
        Ok(Some(node))
    }

    /// Creates every missing key along `path` and returns the id of the last.
    fn create_path(&mut self, path: &KeyPath) -> Result<u64> {
        let root = rooted(path)?;
        let mut ids = Vec::with_capacity(path.depth());
        for _ in path.segments() {
            ids.push(self.next_id());
        }
        let root_id = self.next_id();

        let mut node = self
            .roots
            .entry(root)
            .or_insert_with(|| Node::new(root_id, root.short_name()));
        for (segment, id) in path.segments().iter().zip(ids) {
            let folded = fold_case(segment);
            if !node.children.contains_key(&folded) {
                debug!(key = %segment, "Creating key");
                node.touch();
            }
            node = node
                .children
                .entry(folded)
                .or_insert_with(|| Node::new(id, segment));
        }
        Ok(node.id)
    }

    fn is_denied(&self, path: &KeyPath) -> bool {
        self.denied
            .iter()
            .any(|denied| denied == path || path.parents().any(|parent| parent == *denied))
    }

    fn handle(&self, handle: HandleId) -> Result<&OpenHandle> {
        self.handles.get(&handle).ok_or_else(|| {
            RegistryError::os(ERROR_INVALID_HANDLE, format!("handle {} is not open", handle))
        })
    }

    fn resolve(&self, handle: HandleId) -> Result<(&OpenHandle, &Node)> {
        let open = self.handle(handle)?;
        match self.node(&open.path)? {
            Some(node) if node.id == open.node_id => Ok((open, node)),
            _ => Err(key_deleted(&open.path)),
        }
    }

    fn resolve_for_write(&mut self, handle: HandleId) -> Result<&mut Node> {
        let open = self.handle(handle)?.clone();
        if !open.mode.can_write() {
            return Err(RegistryError::AccessDenied(format!(
                "handle {} on '{}' is read-only",
                handle, open.path
            )));
        }
        match self.node_mut(&open.path)? {
            Some(node) if node.id == open.node_id => Ok(node),
            _ => Err(key_deleted(&open.path)),
        }
    }
}

fn rooted(path: &KeyPath) -> Result<RootToken> {
    path.root().ok_or_else(|| {
        RegistryError::malformed_path(format!("path '{}' has no registry root", path))
    })
}

fn key_deleted(path: &KeyPath) -> RegistryError {
    RegistryError::os(
        ERROR_KEY_DELETED,
        format!("key '{}' has been deleted", path),
    )
}

/// Registry backend held entirely in memory.
///
/// All five roots exist from construction and cannot be deleted.
///
/// # Examples
///
/// ```rust
/// use regkit::{AccessMode, Backend, KeyPath, MemoryBackend};
///
/// let backend = MemoryBackend::new();
/// let path = KeyPath::parse("HKCU\\Software\\App").unwrap();
/// let handle = backend.open_key(&path, AccessMode::Write, true).unwrap();
/// backend.close_key(handle);
/// assert_eq!(backend.open_handle_count(), 0);
/// ```
pub struct MemoryBackend {
    state: RwLock<State>,
}

impl MemoryBackend {
    /// Creates an empty registry holding only the roots.
    pub fn new() -> Self {
        let mut state = State {
            roots: HashMap::new(),
            handles: HashMap::new(),
            denied: Vec::new(),
            next_id: 0,
        };
        for root in RootToken::ALL {
            let id = state.next_id();
            state.roots.insert(root, Node::new(id, root.short_name()));
        }
        Self {
            state: RwLock::new(state),
        }
    }

    /// Marks `path` and everything below it as inaccessible: later opens,
    /// creates and deletes there fail with `AccessDenied`.
    pub fn deny(&self, path: &KeyPath) {
        self.write().denied.push(path.clone());
    }

    /// Lifts every restriction set by [`deny`](Self::deny).
    pub fn allow_all(&self) {
        self.write().denied.clear();
    }

    /// Number of handles currently open.
    pub fn open_handle_count(&self) -> usize {
        self.read().handles.len()
    }

    /// Removes every key and value below the roots. Every open handle
    /// becomes stale.
    pub fn reset(&self) {
        let mut state = self.write();
        for root in RootToken::ALL {
            let id = state.next_id();
            state.roots.insert(root, Node::new(id, root.short_name()));
        }
    }

    // No invariant spans a panic; a poisoned lock is recovered.
    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("MemoryBackend")
            .field("open_handles", &state.handles.len())
            .field("denied", &state.denied)
            .finish()
    }
}

impl Backend for MemoryBackend {
    #[instrument(skip(self, path), fields(path = %path))]
    fn open_key(&self, path: &KeyPath, mode: AccessMode, create: bool) -> Result<HandleId> {
        let mut state = self.write();

        if state.is_denied(path) {
            return Err(RegistryError::AccessDenied(format!("key '{}'", path)));
        }

        let existing = state.node(path)?.map(|node| node.id);
        let node_id = match existing {
            Some(id) => id,
            None if create => state.create_path(path)?,
            None => return Err(RegistryError::not_found("key", &path.to_string())),
        };

        let handle = HandleId(state.next_id());
        state.handles.insert(
            handle,
            OpenHandle {
                path: path.clone(),
                node_id,
                mode,
            },
        );
        debug!(%handle, ?mode, "Opened key");
        Ok(handle)
    }

    fn close_key(&self, handle: HandleId) {
        match self.write().handles.remove(&handle) {
            Some(open) => debug!(%handle, path = %open.path, "Closed key"),
            None => warn!(%handle, "Ignoring close of a handle that is not open"),
        }
    }

    #[instrument(skip(self, path), fields(path = %path))]
    fn delete_key(&self, path: &KeyPath) -> Result<()> {
        let mut state = self.write();

        let parent_path = match path.parent() {
            Some(parent) => parent,
            None => {
                return Err(RegistryError::AccessDenied(format!(
                    "cannot delete registry root '{}'",
                    path
                )));
            }
        };
        if state.is_denied(path) {
            return Err(RegistryError::AccessDenied(format!("key '{}'", path)));
        }

        match state.node(path)? {
            None => return Err(RegistryError::not_found("key", &path.to_string())),
            Some(node) if !node.children.is_empty() => {
                return Err(RegistryError::NotEmpty(format!(
                    "key '{}' has {} subkey(s)",
                    path,
                    node.children.len()
                )));
            }
            Some(_) => {}
        }

        if let Some(parent) = state.node_mut(&parent_path)? {
            parent.children.remove(&fold_case(path.name()));
            parent.touch();
        }
        debug!("Deleted key");
        Ok(())
    }

    fn enumerate_subkey_names(&self, handle: HandleId) -> Result<Vec<String>> {
        let state = self.read();
        let (_, node) = state.resolve(handle)?;
        let names: Vec<String> = node.children.values().map(|child| child.name.clone()).collect();
        trace!(%handle, count = names.len(), "Enumerated subkeys");
        Ok(names)
    }

    fn enumerate_value_names(&self, handle: HandleId) -> Result<Vec<String>> {
        let state = self.read();
        let (_, node) = state.resolve(handle)?;

        // Named values in folded order, the default value last.
        let mut names: Vec<String> = node
            .values
            .values()
            .filter(|entry| !entry.is_default())
            .map(|entry| entry.name.clone())
            .collect();
        if node.values.contains_key("") {
            names.push(String::new());
        }
        trace!(%handle, count = names.len(), "Enumerated values");
        Ok(names)
    }

    fn get_value(&self, handle: HandleId, name: &str) -> Result<ValueEntry> {
        let state = self.read();
        let (open, node) = state.resolve(handle)?;
        node.values.get(&fold_case(name)).cloned().ok_or_else(|| {
            RegistryError::NotFound(format!("value '{}' in '{}'", name, open.path))
        })
    }

    fn set_value(&self, handle: HandleId, entry: ValueEntry) -> Result<()> {
        let mut state = self.write();
        let node = state.resolve_for_write(handle)?;
        trace!(%handle, name = %entry.name, value_type = %entry.value_type, "Setting value");
        node.values.insert(fold_case(&entry.name), entry);
        node.touch();
        Ok(())
    }

    fn delete_value(&self, handle: HandleId, name: &str) -> Result<()> {
        let mut state = self.write();
        let node = state.resolve_for_write(handle)?;
        if node.values.remove(&fold_case(name)).is_none() {
            return Err(RegistryError::not_found("value", name));
        }
        node.touch();
        Ok(())
    }

    fn query_info(&self, handle: HandleId) -> Result<KeyInfo> {
        let state = self.read();
        let (_, node) = state.resolve(handle)?;
        Ok(KeyInfo {
            subkey_count: node.children.len(),
            value_count: node.values.len(),
            last_written: node.last_written,
        })
    }
}

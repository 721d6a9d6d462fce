//! Tree traversal built on the public [`Key`] operations.
//!
//! [`Walk`] mirrors a directory walk: each visited key yields its unopened
//! [`Key`] together with snapshots of its subkey and value names. Handles are
//! held only while a key's names are read, never across yields.

use crate::backend::Backend;
use crate::error::Result;
use crate::key::Key;
use crate::path::KeyPath;
use std::io::Write;
use std::sync::Arc;
use tracing::debug;

/// One visited key.
#[derive(Debug)]
pub struct WalkEntry {
    /// The visited key, unopened.
    pub key: Key,

    /// Direct subkey names at the time of the visit. Editing this list does
    /// not prune the walk; use [`Walk::retain_subkeys`] for that.
    pub subkeys: Vec<String>,

    /// Value names at the time of the visit.
    pub values: Vec<String>,

    /// Distance from the key the walk started at.
    pub depth: usize,
}

impl WalkEntry {
    /// Splits the entry into `(key, subkey_names, value_names)`.
    pub fn into_parts(self) -> (Key, Vec<String>, Vec<String>) {
        (self.key, self.subkeys, self.values)
    }
}

enum Frame {
    Visit { path: KeyPath, depth: usize },
    Emit(WalkEntry),
}

/// Children of the last top-down entry, not yet scheduled.
struct Pending {
    path: KeyPath,
    names: Vec<String>,
    depth: usize,
}

/// Lazy depth-first traversal of a subtree.
///
/// Top-down (the default) yields a key before its descendants; bottom-up
/// yields every descendant before its ancestor. A top-down walk can be
/// pruned between calls to `next` with [`retain_subkeys`] or
/// [`skip_subkeys`].
///
/// Keys removed between being listed and being visited are skipped. Other
/// failures are yielded as `Err` items and the walk carries on; a failure to
/// open the starting key is always yielded.
///
/// [`retain_subkeys`]: Walk::retain_subkeys
/// [`skip_subkeys`]: Walk::skip_subkeys
pub struct Walk {
    backend: Arc<dyn Backend>,
    top_down: bool,
    max_depth: Option<usize>,
    stack: Vec<Frame>,
    pending: Option<Pending>,
}

impl Walk {
    fn new(backend: Arc<dyn Backend>, start: KeyPath) -> Self {
        Self {
            backend,
            top_down: true,
            max_depth: None,
            stack: vec![Frame::Visit {
                path: start,
                depth: 0,
            }],
            pending: None,
        }
    }

    /// Selects pre-order (`true`) or post-order (`false`) traversal.
    pub fn top_down(mut self, top_down: bool) -> Self {
        self.top_down = top_down;
        self
    }

    /// Stops descending below `max_depth` levels; `Some(0)` visits only the
    /// starting key.
    pub fn max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Keeps only the subkeys of the most recent top-down entry for which
    /// `keep` returns true. Has no effect on a bottom-up walk.
    pub fn retain_subkeys<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        if let Some(pending) = self.pending.as_mut() {
            pending.names.retain(|name| keep(name));
        }
    }

    /// Skips every descendant of the most recent top-down entry.
    pub fn skip_subkeys(&mut self) {
        self.pending = None;
    }

    fn schedule(&mut self, parent: &KeyPath, names: &[String], depth: usize) {
        for name in names.iter().rev() {
            self.stack.push(Frame::Visit {
                path: parent.append([name]),
                depth: depth + 1,
            });
        }
    }

    fn snapshot(&self, path: &KeyPath) -> Result<(Vec<String>, Vec<String>)> {
        let opened = Key::new(Arc::clone(&self.backend), path.clone()).open()?;
        Ok((opened.subkey_names()?, opened.value_names()?))
    }
}

impl Iterator for Walk {
    type Item = Result<WalkEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(pending) = self.pending.take() {
            self.schedule(&pending.path, &pending.names, pending.depth);
        }

        while let Some(frame) = self.stack.pop() {
            let (path, depth) = match frame {
                Frame::Emit(entry) => return Some(Ok(entry)),
                Frame::Visit { path, depth } => (path, depth),
            };

            let (subkeys, values) = match self.snapshot(&path) {
                Ok(names) => names,
                Err(err) if depth > 0 && err.is_not_found() => {
                    debug!(path = %path, "Key vanished before it was visited");
                    continue;
                }
                Err(err) => return Some(Err(err)),
            };

            let descend = self.max_depth.map_or(true, |max| depth < max);
            let children = if descend { subkeys.clone() } else { Vec::new() };
            let entry = WalkEntry {
                key: Key::new(Arc::clone(&self.backend), path.clone()),
                subkeys,
                values,
                depth,
            };

            if self.top_down {
                self.pending = Some(Pending {
                    path,
                    names: children,
                    depth,
                });
                return Some(Ok(entry));
            }

            self.stack.push(Frame::Emit(entry));
            self.schedule(&path, &children, depth);
        }
        None
    }
}

/// Direct children of a key, from one name snapshot.
///
/// Produced by [`Key::iterdir`].
pub struct Subkeys {
    backend: Arc<dyn Backend>,
    parent: KeyPath,
    names: std::vec::IntoIter<String>,
}

impl Iterator for Subkeys {
    type Item = Key;

    fn next(&mut self) -> Option<Key> {
        let name = self.names.next()?;
        Some(Key::new(Arc::clone(&self.backend), self.parent.append([&name])))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.names.size_hint()
    }
}

impl ExactSizeIterator for Subkeys {}

impl Key {
    /// Yields the direct children of this open key as unopened keys.
    ///
    /// Each call re-enumerates, so the iterator can be restarted by calling
    /// again.
    pub fn iterdir(&self) -> Result<Subkeys> {
        Ok(Subkeys {
            backend: self.backend(),
            parent: self.path().clone(),
            names: self.subkey_names()?.into_iter(),
        })
    }

    /// Starts a top-down walk of the subtree rooted at this key. The key
    /// does not need to be open.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use regkit::Registry;
    ///
    /// # fn main() -> regkit::Result<()> {
    /// let registry = Registry::in_memory();
    /// registry.current_user().create_subkey("App\\Plugins\\Spell")?;
    ///
    /// let mut visited = Vec::new();
    /// for entry in registry.current_user().subkey("App").walk() {
    ///     visited.push(entry?.key.to_string());
    /// }
    /// assert_eq!(visited, ["HKCU\\App", "HKCU\\App\\Plugins", "HKCU\\App\\Plugins\\Spell"]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn walk(&self) -> Walk {
        Walk::new(self.backend(), self.path().clone())
    }

    /// Writes an indented listing of this key, its values and its subkeys.
    /// With `recursive` the whole subtree is listed.
    pub fn write_tree<W: Write>(&self, out: &mut W, recursive: bool) -> Result<()> {
        self.write_tree_at(out, recursive, 0)
    }

    fn write_tree_at<W: Write>(&self, out: &mut W, recursive: bool, level: usize) -> Result<()> {
        const INDENT: &str = "    ";

        writeln!(out, "{}key: '{}'", INDENT.repeat(level), self.name())?;
        let opened = self.open()?;
        for item in opened.items()? {
            let (name, value) = item?;
            writeln!(out, "{}val: '{}' = {}", INDENT.repeat(level + 1), name, value)?;
        }
        for child in opened.iterdir()? {
            if recursive {
                child.write_tree_at(out, true, level + 1)?;
            } else {
                writeln!(out, "{}key: '{}'", INDENT.repeat(level + 1), child.name())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::registry::Registry;

    fn build(registry: &Registry) {
        let root = registry.current_user();
        for path in ["T\\A\\A1", "T\\A\\A2", "T\\B"] {
            root.create_subkey(path).unwrap();
        }
        root.create_subkey("T\\A").unwrap().set("v", "x").unwrap();
    }

    fn paths(registry: &Registry, top_down: bool) -> Vec<String> {
        registry
            .current_user()
            .subkey("T")
            .walk()
            .top_down(top_down)
            .map(|entry| entry.unwrap().key.to_string())
            .collect()
    }

    #[test]
    fn test_top_down_order() {
        let registry = Registry::in_memory();
        build(&registry);
        assert_eq!(
            paths(&registry, true),
            vec!["HKCU\\T", "HKCU\\T\\A", "HKCU\\T\\A\\A1", "HKCU\\T\\A\\A2", "HKCU\\T\\B"]
        );
    }

    #[test]
    fn test_bottom_up_order() {
        let registry = Registry::in_memory();
        build(&registry);
        assert_eq!(
            paths(&registry, false),
            vec!["HKCU\\T\\A\\A1", "HKCU\\T\\A\\A2", "HKCU\\T\\A", "HKCU\\T\\B", "HKCU\\T"]
        );
    }

    #[test]
    fn test_entry_names() {
        let registry = Registry::in_memory();
        build(&registry);
        let entry = registry
            .current_user()
            .subkey("T\\A")
            .walk()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(entry.subkeys, vec!["A1", "A2"]);
        assert_eq!(entry.values, vec!["v"]);
        assert_eq!(entry.depth, 0);
    }

    #[test]
    fn test_prune() {
        let registry = Registry::in_memory();
        build(&registry);
        let mut walk = registry.current_user().subkey("T").walk();
        let mut seen = Vec::new();
        while let Some(entry) = walk.next() {
            let entry = entry.unwrap();
            seen.push(entry.key.to_string());
            if entry.depth == 0 {
                walk.retain_subkeys(|name| name != "A");
            }
        }
        assert_eq!(seen, vec!["HKCU\\T", "HKCU\\T\\B"]);
    }

    #[test]
    fn test_max_depth() {
        let registry = Registry::in_memory();
        build(&registry);
        let seen: Vec<String> = registry
            .current_user()
            .subkey("T")
            .walk()
            .max_depth(Some(1))
            .map(|entry| entry.unwrap().key.to_string())
            .collect();
        assert_eq!(seen, vec!["HKCU\\T", "HKCU\\T\\A", "HKCU\\T\\B"]);
    }

    #[test]
    fn test_missing_start_is_error() {
        let registry = Registry::in_memory();
        let mut walk = registry.current_user().subkey("Missing").walk();
        assert!(walk.next().unwrap().unwrap_err().is_not_found());
        assert!(walk.next().is_none());
    }

    #[test]
    fn test_iterdir_restartable() {
        let registry = Registry::in_memory();
        build(&registry);
        let t = registry.current_user().open_subkey("T", &Default::default()).unwrap();
        let first: Vec<String> = t.iterdir().unwrap().map(|k| k.name().to_string()).collect();
        let second: Vec<String> = t.iterdir().unwrap().map(|k| k.name().to_string()).collect();
        assert_eq!(first, vec!["A", "B"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_write_tree() {
        let registry = Registry::in_memory();
        build(&registry);
        let mut out = Vec::new();
        registry
            .current_user()
            .subkey("T")
            .write_tree(&mut out, true)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "key: 'T'\n    key: 'A'\n        val: 'v' = x\n        key: 'A1'\n        key: 'A2'\n    key: 'B'\n"
        );
    }
}

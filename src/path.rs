//! Hierarchical key paths.
//!
//! A [`KeyPath`] is an optional [`RootToken`] followed by lexical segments.
//! Everything here is pure: building, joining or walking up a path never
//! touches a backend, so a path may name a key that does not exist.
//!
//! ```text
//! HKCU\Software\App
//! ^^^^ ^^^^^^^^ ^^^
//! root segment  segment (= name)
//! ```

use crate::error::{RegistryError, Result};
use crate::root::RootToken;
use crate::utils::fold_case;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Canonical path separator.
pub const SEPARATOR: char = '\\';

/// Separator also accepted when parsing.
pub const ALT_SEPARATOR: char = '/';

fn split_segments(text: &str) -> impl Iterator<Item = &str> {
    text.split([SEPARATOR, ALT_SEPARATOR])
        .filter(|segment| !segment.is_empty())
}

/// Accepts `name` only if it is a single non-empty segment.
pub(crate) fn check_segment(name: &str) -> Result<&str> {
    if name.is_empty() || name.contains([SEPARATOR, ALT_SEPARATOR]) {
        return Err(RegistryError::malformed_path(format!(
            "invalid path segment '{}'",
            name
        )));
    }
    Ok(name)
}

/// Path of a registry key.
///
/// Equality, ordering and hashing ignore case, matching how the registry
/// resolves names.
#[derive(Debug, Clone, Default)]
pub struct KeyPath {
    root: Option<RootToken>,
    segments: Vec<String>,
}

impl KeyPath {
    /// Creates the fully empty path (no root, no segments).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a path naming a bare root.
    pub fn from_root(root: RootToken) -> Self {
        Self {
            root: Some(root),
            segments: Vec::new(),
        }
    }

    /// Parses path text.
    ///
    /// Leading, trailing and repeated separators are ignored, and `/` is
    /// accepted in place of `\`. Whitespace is part of a segment and is kept.
    /// A leading root alias in short or long form becomes the root; a leading
    /// `HKEY_*` token that names no known root is rejected. Any other leading
    /// token starts a relative path.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::MalformedPath`] if the text holds no segments
    /// or names an unknown root.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use regkit::{KeyPath, RootToken};
    ///
    /// let path = KeyPath::parse("HKEY_CURRENT_USER/Software//App\\").unwrap();
    /// assert_eq!(path.root(), Some(RootToken::CurrentUser));
    /// assert_eq!(path.to_string(), "HKCU\\Software\\App");
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let mut tokens = split_segments(text).peekable();
        let first = tokens
            .peek()
            .copied()
            .ok_or_else(|| RegistryError::malformed_path("path cannot be empty"))?;

        let root = match RootToken::from_alias(first) {
            Some(root) => {
                tokens.next();
                Some(root)
            }
            None if RootToken::looks_like_root(first) => {
                return Err(RegistryError::malformed_path(format!(
                    "unknown registry root '{}'",
                    first
                )));
            }
            None => None,
        };

        Ok(Self {
            root,
            segments: tokens.map(str::to_string).collect(),
        })
    }

    /// Builds a path from already-tokenized parts, as returned by [`parts`].
    ///
    /// The first part is taken as the root if it is a root alias. Parts are
    /// not split again; each must be non-empty and free of separators.
    ///
    /// [`parts`]: KeyPath::parts
    pub fn from_parts<I, S>(parts: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = Self::new();
        for (index, part) in parts.into_iter().enumerate() {
            let part = part.as_ref();
            if index == 0 {
                if let Some(root) = RootToken::from_alias(part) {
                    path.root = Some(root);
                    continue;
                }
                if RootToken::looks_like_root(part) {
                    return Err(RegistryError::malformed_path(format!(
                        "unknown registry root '{}'",
                        part
                    )));
                }
            }
            path.segments.push(check_segment(part)?.to_string());
        }
        Ok(path)
    }

    /// Returns the root, if the path is anchored.
    pub fn root(&self) -> Option<RootToken> {
        self.root
    }

    /// Returns the segments below the root.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns `(root?, segment, segment, ...)` as text, root in short form.
    pub fn parts(&self) -> Vec<&str> {
        self.root
            .map(|root| root.short_name())
            .into_iter()
            .chain(self.segments.iter().map(String::as_str))
            .collect()
    }

    /// Returns the last part: the final segment, the root alias for a bare
    /// root, or `""` for the empty path.
    pub fn name(&self) -> &str {
        match (self.segments.last(), self.root) {
            (Some(segment), _) => segment,
            (None, Some(root)) => root.short_name(),
            (None, None) => "",
        }
    }

    /// Returns true for a bare root with no segments.
    pub fn is_root(&self) -> bool {
        self.root.is_some() && self.segments.is_empty()
    }

    /// Returns true for the fully empty path.
    pub fn is_empty(&self) -> bool {
        self.root.is_none() && self.segments.is_empty()
    }

    /// Number of segments below the root.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Returns the path with the last segment removed, or `None` at a root
    /// or the empty path.
    pub fn parent(&self) -> Option<KeyPath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            root: self.root,
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Enumerates ancestors nearest-first, ending at the root.
    pub fn parents(&self) -> impl Iterator<Item = KeyPath> {
        std::iter::successors(self.parent(), KeyPath::parent)
    }

    /// Appends segments. Each item may itself hold several separated
    /// segments; empty pieces are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::MalformedPath`] if the result has no root but
    /// starts with a root alias or an `HKEY_*` token, since its text would
    /// parse back as a different path.
    pub fn join<I, S>(&self, segments: I) -> Result<KeyPath>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let path = self.append(segments);
        if path.root.is_none() {
            if let Some(first) = path.segments.first() {
                if RootToken::from_alias(first).is_some() || RootToken::looks_like_root(first) {
                    return Err(RegistryError::malformed_path(format!(
                        "relative path cannot start with root-like segment '{}'",
                        first
                    )));
                }
            }
        }
        Ok(path)
    }

    /// Appends a single (possibly multi-segment) relative path.
    pub fn child(&self, name: &str) -> Result<KeyPath> {
        self.join([name])
    }

    /// Appends segments without the relative-head check. Used below a root,
    /// where no segment can be mistaken for one.
    pub(crate) fn append<I, S>(&self, segments: I) -> KeyPath
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = self.clone();
        for item in segments {
            path.segments
                .extend(split_segments(item.as_ref()).map(str::to_string));
        }
        path
    }

    /// Returns the segments joined by the separator, without the root.
    pub fn subpath(&self) -> String {
        self.segments.join(&SEPARATOR.to_string())
    }

    /// Returns the path with the root rendered in its long form.
    pub fn to_long_string(&self) -> String {
        self.render(RootToken::long_name)
    }

    fn render(&self, root_name: fn(&RootToken) -> &'static str) -> String {
        let mut out = String::new();
        if let Some(root) = &self.root {
            out.push_str(root_name(root));
        }
        for segment in &self.segments {
            if !out.is_empty() {
                out.push(SEPARATOR);
            }
            out.push_str(segment);
        }
        out
    }

    fn folded_segments(&self) -> impl Iterator<Item = String> + '_ {
        self.segments.iter().map(|segment| fold_case(segment))
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(RootToken::short_name))
    }
}

impl FromStr for KeyPath {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialEq for KeyPath {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyPath {}

impl PartialOrd for KeyPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.root
            .cmp(&other.root)
            .then_with(|| self.folded_segments().cmp(other.folded_segments()))
    }
}

impl Hash for KeyPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.root.hash(state);
        for segment in self.folded_segments() {
            segment.hash(state);
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for KeyPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for KeyPath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        KeyPath::parse(&text).map_err(serde::de::Error::custom)
    }
}

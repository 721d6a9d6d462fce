//! Subtree export and import.
//!
//! [`Key::as_dict`] captures a key, its values and all descendants as a
//! [`Subtree`]; [`Key::from_dict`] writes one back. The shape is recursive:
//!
//! ```text
//! {
//!   "__values__":  { "<name>": { "value": ..., "type": "REG_SZ" }, ... },
//!   "__subkeys__": { "<name>": { "__values__": ..., "__subkeys__": ... }, ... }
//! }
//! ```
//!
//! With the `serde` feature the same shape serializes to JSON.

use crate::error::Result;
use crate::key::Key;
use crate::path::check_segment;
use crate::utils::fold_case;
use crate::value::{infer_type, Value, ValueType};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, instrument};

/// A value together with its registry type.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TypedValue {
    /// Native value.
    pub value: Value,

    /// Registry type the value is stored as.
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub value_type: ValueType,
}

impl TypedValue {
    /// Pairs a value with an explicit type.
    pub fn new(value: impl Into<Value>, value_type: ValueType) -> Self {
        Self {
            value: value.into(),
            value_type,
        }
    }

    /// Pairs a value with the type inferred from its shape.
    pub fn inferred(value: impl Into<Value>) -> Result<Self> {
        let value = value.into();
        let value_type = infer_type(&value)?;
        Ok(Self { value, value_type })
    }
}

/// Snapshot of a key's values and descendant keys.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Subtree {
    /// Values by name; `""` is the default value.
    #[cfg_attr(feature = "serde", serde(rename = "__values__", default))]
    pub values: BTreeMap<String, TypedValue>,

    /// Child snapshots by key name.
    #[cfg_attr(feature = "serde", serde(rename = "__subkeys__", default))]
    pub subkeys: BTreeMap<String, Subtree>,
}

impl Subtree {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value, inferring its type.
    pub fn with_value(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.values
            .insert(name.to_string(), TypedValue::inferred(value)?);
        Ok(self)
    }

    /// Adds a value with an explicit type.
    pub fn with_typed(mut self, name: &str, value: impl Into<Value>, value_type: ValueType) -> Self {
        self.values
            .insert(name.to_string(), TypedValue::new(value, value_type));
        self
    }

    /// Adds a child snapshot.
    pub fn with_subkey(mut self, name: &str, subtree: Subtree) -> Self {
        self.subkeys.insert(name.to_string(), subtree);
        self
    }

    /// Number of keys, counting this one.
    pub fn key_count(&self) -> usize {
        1 + self.subkeys.values().map(Subtree::key_count).sum::<usize>()
    }

    /// Number of values in the whole snapshot.
    pub fn value_count(&self) -> usize {
        self.values.len() + self.subkeys.values().map(Subtree::value_count).sum::<usize>()
    }

    // Every subkey name must map onto exactly one key.
    fn check_names(&self) -> Result<()> {
        for (name, child) in &self.subkeys {
            check_segment(name)?;
            child.check_names()?;
        }
        Ok(())
    }

    /// Renders the snapshot as pretty-printed JSON.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a snapshot from JSON.
    #[cfg(feature = "serde")]
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl Key {
    /// Exports this key and its whole subtree. Read-only.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the key does not exist, or the first failure
    /// met while reading a descendant.
    #[instrument(skip(self), fields(path = %self.path()))]
    pub fn as_dict(&self) -> Result<Subtree> {
        let opened = self.open()?;
        let mut subtree = Subtree::new();

        for item in opened.items_typed()? {
            let (name, value, value_type) = item?;
            subtree.values.insert(name, TypedValue { value, value_type });
        }
        for child in opened.iterdir()? {
            let name = child.name().to_string();
            subtree.subkeys.insert(name, child.as_dict()?);
        }

        debug!(values = subtree.values.len(), subkeys = subtree.subkeys.len(), "Exported key");
        Ok(subtree)
    }

    /// Imports a snapshot below this key as an additive merge.
    ///
    /// Keys are created as needed and values of the same name are
    /// overwritten; values and subkeys not named in `data` are left alone.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPath` if any subkey name in `data` is empty or holds
    /// a separator; nothing is written in that case.
    #[instrument(skip(self, data), fields(path = %self.path()))]
    pub fn from_dict(&self, data: &Subtree) -> Result<()> {
        data.check_names()?;
        self.import(data, false)
    }

    /// Imports a snapshot, then removes every value and subkey under this
    /// key that `data` does not name, so the subtree ends up matching it.
    #[instrument(skip(self, data), fields(path = %self.path()))]
    pub fn replace_from_dict(&self, data: &Subtree) -> Result<()> {
        data.check_names()?;
        self.import(data, true)
    }

    fn import(&self, data: &Subtree, prune: bool) -> Result<()> {
        let opened = self.create()?;

        for (name, typed) in &data.values {
            opened.set_typed(name, typed.value.clone(), typed.value_type)?;
        }
        for (name, child) in &data.subkeys {
            self.subkey(name).import(child, prune)?;
        }

        if prune {
            let wanted: HashSet<String> = data.subkeys.keys().map(|name| fold_case(name)).collect();
            for child in opened.iterdir()? {
                if !wanted.contains(&fold_case(child.name())) {
                    debug!(key = %child, "Removing key absent from snapshot");
                    child.delete(true)?;
                }
            }

            let wanted: HashSet<String> = data.values.keys().map(|name| fold_case(name)).collect();
            for name in opened.value_names()? {
                if !wanted.contains(&fold_case(&name)) {
                    opened.delete_value(&name)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use crate::registry::Registry;

    fn sample() -> Subtree {
        Subtree::new()
            .with_value("x", 1u32)
            .unwrap()
            .with_typed("path", "%HOME%", ValueType::ExpandString)
            .with_subkey(
                "Child",
                Subtree::new().with_value("", "default").unwrap(),
            )
    }

    #[test]
    fn test_counts() {
        let data = sample();
        assert_eq!(data.key_count(), 2);
        assert_eq!(data.value_count(), 3);
    }

    #[test]
    fn test_round_trip() {
        let registry = Registry::in_memory();
        let key = registry.current_user().subkey("Snap");
        key.from_dict(&sample()).unwrap();
        assert_eq!(key.as_dict().unwrap(), sample());
    }

    #[test]
    fn test_merge_keeps_unrelated() {
        let registry = Registry::in_memory();
        let key = registry.current_user().subkey("Merge");
        {
            let opened = key.create().unwrap();
            opened.set("keep", "me").unwrap();
            opened.set("x", "old").unwrap();
        }
        key.create_subkey("Other").unwrap();

        key.from_dict(&sample()).unwrap();

        let opened = key.open().unwrap();
        assert_eq!(opened.get("keep").unwrap(), Value::from("me"));
        assert_eq!(opened.get("x").unwrap(), Value::Int(1));
        assert!(key.subkey("Other").exists().unwrap());
    }

    #[test]
    fn test_replace_prunes() {
        let registry = Registry::in_memory();
        let key = registry.current_user().subkey("Replace");
        key.create().unwrap().set("stale", 5u32).unwrap();
        key.create_subkey("Old\\Deep").unwrap();

        key.replace_from_dict(&sample()).unwrap();

        assert_eq!(key.as_dict().unwrap(), sample());
        assert!(!key.subkey("Old").exists().unwrap());
    }

    #[test]
    fn test_bad_subkey_names_rejected() {
        let registry = Registry::in_memory();
        let key = registry.current_user().subkey("Names");

        for name in ["", "a\\b", "a/b"] {
            let data = Subtree::new().with_subkey(name, Subtree::new().with_value("y", 1u32).unwrap());
            assert!(matches!(
                key.from_dict(&data),
                Err(RegistryError::MalformedPath(_))
            ));
        }
        assert!(!key.exists().unwrap());
    }

    #[test]
    fn test_nested_bad_name_writes_nothing() {
        let registry = Registry::in_memory();
        let key = registry.current_user().subkey("Nested");
        let data = Subtree::new().with_subkey(
            "Ok",
            Subtree::new().with_subkey("", Subtree::new().with_value("y", 1u32).unwrap()),
        );

        assert!(key.replace_from_dict(&data).is_err());
        assert!(key.from_dict(&data).is_err());
        assert!(!key.exists().unwrap());
    }
}

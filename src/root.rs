//! Top-level hive identifiers.
//!
//! Each root has exactly one short alias (`HKCU`) and one long alias
//! (`HKEY_CURRENT_USER`). Parsing accepts either form, ASCII case-insensitive;
//! serialization always emits the short form.

use crate::error::{RegistryError, Result};
use std::fmt;
use std::str::FromStr;

/// Top-level hive of the registry tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RootToken {
    /// File associations and COM registrations (HKCR).
    ClassesRoot,

    /// Settings of the interactive user (HKCU).
    CurrentUser,

    /// Machine-wide settings (HKLM).
    LocalMachine,

    /// Profiles of all loaded users (HKU).
    Users,

    /// Current hardware profile (HKCC).
    CurrentConfig,
}

impl RootToken {
    /// All roots, in native handle order.
    pub const ALL: [RootToken; 5] = [
        RootToken::ClassesRoot,
        RootToken::CurrentUser,
        RootToken::LocalMachine,
        RootToken::Users,
        RootToken::CurrentConfig,
    ];

    /// Parses a root from either its short or long alias.
    ///
    /// Returns `None` if the text names no known root.
    pub fn from_alias(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|root| {
            text.eq_ignore_ascii_case(root.short_name()) || text.eq_ignore_ascii_case(root.long_name())
        })
    }

    /// Returns the canonical short alias, e.g. `HKCU`.
    pub fn short_name(&self) -> &'static str {
        match self {
            RootToken::ClassesRoot => "HKCR",
            RootToken::CurrentUser => "HKCU",
            RootToken::LocalMachine => "HKLM",
            RootToken::Users => "HKU",
            RootToken::CurrentConfig => "HKCC",
        }
    }

    /// Returns the canonical long alias, e.g. `HKEY_CURRENT_USER`.
    pub fn long_name(&self) -> &'static str {
        match self {
            RootToken::ClassesRoot => "HKEY_CLASSES_ROOT",
            RootToken::CurrentUser => "HKEY_CURRENT_USER",
            RootToken::LocalMachine => "HKEY_LOCAL_MACHINE",
            RootToken::Users => "HKEY_USERS",
            RootToken::CurrentConfig => "HKEY_CURRENT_CONFIG",
        }
    }

    /// Returns true if the text is shaped like a root alias (`HKEY_*`).
    pub(crate) fn looks_like_root(text: &str) -> bool {
        text.get(..5)
            .map_or(false, |prefix| prefix.eq_ignore_ascii_case("HKEY_"))
    }
}

impl fmt::Display for RootToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for RootToken {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_alias(s)
            .ok_or_else(|| RegistryError::malformed_path(format!("unknown registry root '{}'", s)))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for RootToken {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.short_name())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for RootToken {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

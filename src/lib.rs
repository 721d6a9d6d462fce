//! # Registry Key Toolkit
//!
//! A typed, backend-agnostic model of a hierarchical registry: keys addressed
//! by path, each holding named and typed values, with lifecycle-safe handles.
//!
//! ## Features
//!
//! - **Path model**: parse and render `HKCU\Software\App` style paths, with
//!   short or long root aliases and case-insensitive identity
//! - **Typed values**: native values map to and from their stored form
//!   (REG_SZ, REG_DWORD, REG_MULTI_SZ, REG_QWORD, REG_BINARY, ...)
//! - **Scoped handles**: an opened [`Key`] releases its handle on every exit
//!   path of the owning scope
//! - **Traversal**: lazy top-down or bottom-up walks, and whole-subtree
//!   export/import through [`Subtree`]
//! - **Pluggable backends**: everything runs against the [`Backend`] trait;
//!   [`MemoryBackend`] is a complete in-process implementation
//!
//! ## Architecture
//!
//! The crate is built in layers:
//!
//! 1. **Paths** ([`path`], [`root`]): pure text and segment handling
//! 2. **Codec** ([`value`], [`utils`]): native value to stored entry and back
//! 3. **Backend** ([`backend`], [`memory`]): the raw keyed store behind handles
//! 4. **Keys** ([`registry`], [`key`]): lifecycle and value operations
//! 5. **Traversal** ([`walk`], [`snapshot`]): built only on public key operations
//!
//! ## Examples
//!
//! ### Basic Usage
//!
//! ```rust
//! use regkit::{Registry, Value};
//!
//! # fn main() -> regkit::Result<()> {
//! let registry = Registry::in_memory();
//!
//! let app = registry.key("HKCU\\Software\\App")?.create()?;
//! app.set("name", "regkit")?;
//! app.set("", "default")?;
//!
//! for item in app.items()? {
//!     let (name, value) = item?;
//!     println!("{:?} = {}", name, value);
//! }
//! assert_eq!(app.get("name")?, Value::from("regkit"));
//! # Ok(())
//! # }
//! ```
//!
//! ### Exporting a Subtree
//!
//! ```rust
//! use regkit::Registry;
//!
//! # fn main() -> regkit::Result<()> {
//! let registry = Registry::in_memory();
//! registry.current_user().create_subkey("App\\Plugins")?.set("count", 2u32)?;
//!
//! let data = registry.key("HKCU\\App")?.as_dict()?;
//! registry.key("HKCU\\Copy")?.from_dict(&data)?;
//! assert_eq!(registry.key("HKCU\\Copy")?.as_dict()?, data);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod key;
pub mod memory;
pub mod path;
pub mod registry;
pub mod root;
pub mod snapshot;
pub mod utils;
pub mod value;
pub mod walk;

// Re-export main types for convenience
pub use backend::{AccessMode, Backend, HandleId, KeyInfo};
pub use error::{RegistryError, Result};
pub use key::{ItemsTyped, Key, OpenOptions};
pub use memory::MemoryBackend;
pub use path::KeyPath;
pub use registry::Registry;
pub use root::RootToken;
pub use snapshot::{Subtree, TypedValue};
pub use value::{Value, ValueEntry, ValueType};
pub use walk::{Subkeys, Walk, WalkEntry};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

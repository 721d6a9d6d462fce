//! Registry values and their byte encoding.
//!
//! A stored value is a [`ValueEntry`]: a name, a [`ValueType`] tag and raw
//! bytes. [`encode`] and [`decode`] convert between that form and the native
//! [`Value`]. Neither touches a backend.
//!
//! | Type                     | Native            | Bytes                          |
//! |--------------------------|-------------------|--------------------------------|
//! | `REG_SZ`, `REG_EXPAND_SZ`, `REG_LINK` | `Str` | UTF-16LE, NUL-terminated |
//! | `REG_MULTI_SZ`           | `StrList`         | NUL-terminated items + NUL     |
//! | `REG_DWORD`              | `Int`             | 4 bytes little-endian          |
//! | `REG_DWORD_BIG_ENDIAN`   | `Int`             | 4 bytes big-endian             |
//! | `REG_QWORD`              | `Int`             | 8 bytes little-endian          |
//! | `REG_NONE`               | `None` / `Bytes`  | empty / opaque                 |
//! | anything else            | `Bytes`           | opaque                         |

use crate::error::{RegistryError, Result};
use crate::utils::{read_u32_be, read_u32_le, read_u64_le, read_utf16_string, write_utf16_string};
use std::fmt;

/// Registry value data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// No value type.
    None,

    /// String (null-terminated).
    String,

    /// String with environment variables.
    ExpandString,

    /// Binary data.
    Binary,

    /// 32-bit little-endian integer.
    Dword,

    /// 32-bit big-endian integer.
    DwordBigEndian,

    /// Symbolic link (Unicode).
    Link,

    /// Multiple strings.
    MultiString,

    /// Resource list.
    ResourceList,

    /// Full resource descriptor.
    FullResourceDescriptor,

    /// Resource requirements list.
    ResourceRequirementsList,

    /// 64-bit little-endian integer.
    Qword,

    /// Unknown or non-standard value type.
    /// Contains the raw type value.
    Unknown(u32),
}

impl ValueType {
    /// Returns the native numeric tag.
    pub fn to_u32(self) -> u32 {
        match self {
            ValueType::None => 0,
            ValueType::String => 1,
            ValueType::ExpandString => 2,
            ValueType::Binary => 3,
            ValueType::Dword => 4,
            ValueType::DwordBigEndian => 5,
            ValueType::Link => 6,
            ValueType::MultiString => 7,
            ValueType::ResourceList => 8,
            ValueType::FullResourceDescriptor => 9,
            ValueType::ResourceRequirementsList => 10,
            ValueType::Qword => 11,
            ValueType::Unknown(value) => value,
        }
    }

    /// Returns the name of this value type.
    pub fn name(&self) -> String {
        match self {
            ValueType::None => "REG_NONE".to_string(),
            ValueType::String => "REG_SZ".to_string(),
            ValueType::ExpandString => "REG_EXPAND_SZ".to_string(),
            ValueType::Binary => "REG_BINARY".to_string(),
            ValueType::Dword => "REG_DWORD".to_string(),
            ValueType::DwordBigEndian => "REG_DWORD_BIG_ENDIAN".to_string(),
            ValueType::Link => "REG_LINK".to_string(),
            ValueType::MultiString => "REG_MULTI_SZ".to_string(),
            ValueType::ResourceList => "REG_RESOURCE_LIST".to_string(),
            ValueType::FullResourceDescriptor => "REG_FULL_RESOURCE_DESCRIPTOR".to_string(),
            ValueType::ResourceRequirementsList => "REG_RESOURCE_REQUIREMENTS_LIST".to_string(),
            ValueType::Qword => "REG_QWORD".to_string(),
            ValueType::Unknown(value) => format!("REG_UNKNOWN_{:#010x}", value),
        }
    }

    /// Parses a name produced by [`ValueType::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        let known = (0u32..=11).map(ValueType::from).find(|t| t.name() == name);
        known.or_else(|| {
            let hex = name.strip_prefix("REG_UNKNOWN_0x")?;
            u32::from_str_radix(hex, 16).ok().map(ValueType::from)
        })
    }

    /// Returns true for the string-shaped types (`REG_SZ`, `REG_EXPAND_SZ`, `REG_LINK`).
    pub fn is_string(&self) -> bool {
        matches!(self, ValueType::String | ValueType::ExpandString | ValueType::Link)
    }

    /// Returns true for the integer types.
    pub fn is_integer(&self) -> bool {
        matches!(self, ValueType::Dword | ValueType::DwordBigEndian | ValueType::Qword)
    }
}

impl From<u32> for ValueType {
    /// Value types 0-11 are predefined, but other tags are allowed as well
    /// and map to [`ValueType::Unknown`].
    fn from(value: u32) -> Self {
        match value {
            0 => ValueType::None,
            1 => ValueType::String,
            2 => ValueType::ExpandString,
            3 => ValueType::Binary,
            4 => ValueType::Dword,
            5 => ValueType::DwordBigEndian,
            6 => ValueType::Link,
            7 => ValueType::MultiString,
            8 => ValueType::ResourceList,
            9 => ValueType::FullResourceDescriptor,
            10 => ValueType::ResourceRequirementsList,
            11 => ValueType::Qword,
            _ => ValueType::Unknown(value),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ValueType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ValueType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        ValueType::from_name(&name)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown value type '{}'", name)))
    }
}

/// Native value data.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Value {
    /// No data.
    None,

    /// Opaque bytes.
    Bytes(Vec<u8>),

    /// Unsigned integer.
    Int(u64),

    /// String.
    Str(String),

    /// List of strings.
    StrList(Vec<String>),
}

impl Value {
    /// Returns the string, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer, if this is an integer value.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the bytes, if this is a binary value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the strings, if this is a string list.
    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            Value::StrList(items) => Some(items),
            _ => None,
        }
    }

    /// Returns true for [`Value::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("(none)"),
            Value::Bytes(b) => f.write_str(&hex::encode_upper(b)),
            Value::Int(n) => write!(f, "{} ({:#x})", n, n),
            Value::Str(s) => f.write_str(s),
            Value::StrList(items) => f.write_str(&items.join(", ")),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Value::Int(value.into())
    }
}

impl From<u16> for Value {
    fn from(value: u16) -> Self {
        Value::Int(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(value.into())
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Int(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Value::StrList(value)
    }
}

impl From<Vec<&str>> for Value {
    fn from(value: Vec<&str>) -> Self {
        Value::StrList(value.into_iter().map(str::to_string).collect())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::None
    }
}

/// A value as the backend stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueEntry {
    /// Value name; `""` is the key's default value.
    pub name: String,

    /// Type tag deciding how `data` decodes.
    pub value_type: ValueType,

    /// Raw bytes.
    pub data: Vec<u8>,
}

impl ValueEntry {
    /// Creates an entry from raw parts.
    pub fn new(name: impl Into<String>, value_type: ValueType, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            value_type,
            data,
        }
    }

    /// Returns true if this is the key's unnamed default value.
    pub fn is_default(&self) -> bool {
        self.name.is_empty()
    }

    /// Decodes the stored bytes. See [`decode`].
    pub fn value(&self) -> Result<Value> {
        decode(self)
    }
}

/// Infers a registry type from the shape of a native value.
///
/// Precedence: bytes, then integers within 32 bits, then strings, then string
/// lists. [`Value::None`] maps to `REG_NONE`.
///
/// # Errors
///
/// Returns [`RegistryError::UnsupportedType`] when no rule matches, e.g. for
/// an integer wider than 32 bits.
pub fn infer_type(value: &Value) -> Result<ValueType> {
    match value {
        Value::Bytes(_) => Ok(ValueType::Binary),
        Value::Int(n) if *n <= u64::from(u32::MAX) => Ok(ValueType::Dword),
        Value::Str(_) => Ok(ValueType::String),
        Value::StrList(_) => Ok(ValueType::MultiString),
        Value::None => Ok(ValueType::None),
        Value::Int(n) => Err(RegistryError::UnsupportedType(format!(
            "integer {} exceeds 32 bits and no type was given",
            n
        ))),
    }
}

/// Encodes a native value into a stored entry.
///
/// With `explicit_type` omitted the type is inferred by [`infer_type`].
///
/// # Errors
///
/// Returns [`RegistryError::UnsupportedType`] if the value does not fit the
/// type, and [`RegistryError::InvalidData`] for values that would not decode
/// back unchanged: a string or list item with an embedded NUL, a string list
/// holding an empty item, or empty bytes under `REG_NONE`.
///
/// # Examples
///
/// ```rust
/// use regkit::value::{decode, encode, Value, ValueType};
///
/// let entry = encode("Port", &Value::Int(8080), None).unwrap();
/// assert_eq!(entry.value_type, ValueType::Dword);
/// assert_eq!(entry.data, vec![0x90, 0x1F, 0, 0]);
/// assert_eq!(decode(&entry).unwrap(), Value::Int(8080));
/// ```
pub fn encode(name: &str, value: &Value, explicit_type: Option<ValueType>) -> Result<ValueEntry> {
    let value_type = match explicit_type {
        Some(t) => t,
        None => infer_type(value)?,
    };

    let data = match (value, value_type) {
        (Value::Str(s), t) if t.is_string() => {
            check_no_nul(s, t)?;
            let mut data = Vec::with_capacity((s.len() + 1) * 2);
            write_utf16_string(&mut data, s);
            data
        }
        (Value::StrList(items), ValueType::MultiString) => encode_multi_string(items)?,
        (Value::Int(n), ValueType::Dword) => to_u32(*n, value_type)?.to_le_bytes().to_vec(),
        (Value::Int(n), ValueType::DwordBigEndian) => to_u32(*n, value_type)?.to_be_bytes().to_vec(),
        (Value::Int(n), ValueType::Qword) => n.to_le_bytes().to_vec(),
        (Value::None, ValueType::None) => Vec::new(),
        (Value::Bytes(b), ValueType::None) if b.is_empty() => {
            return Err(RegistryError::InvalidData(
                "empty REG_NONE data is written as Value::None".to_string(),
            ));
        }
        (Value::Bytes(b), t) if !t.is_string() && !t.is_integer() && t != ValueType::MultiString => {
            b.clone()
        }
        (value, t) => {
            return Err(RegistryError::UnsupportedType(format!(
                "{} cannot hold {}",
                t,
                shape_name(value)
            )));
        }
    };

    Ok(ValueEntry::new(name, value_type, data))
}

/// Decodes a stored entry by its type tag.
///
/// Types without a native decoding (resource lists, unknown tags) come back
/// as [`Value::Bytes`] unchanged, so opaque data always round-trips.
///
/// # Errors
///
/// Returns an error if the bytes are malformed for a decodable type
/// (truncated integers, invalid UTF-16).
pub fn decode(entry: &ValueEntry) -> Result<Value> {
    let data = entry.data.as_slice();

    match entry.value_type {
        ValueType::None if data.is_empty() => Ok(Value::None),
        t if t.is_string() => Ok(Value::Str(read_utf16_string(data)?)),
        ValueType::MultiString => {
            let joined = read_utf16_string(data)?;
            let items = joined
                .split('\0')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            Ok(Value::StrList(items))
        }
        ValueType::Dword => Ok(Value::Int(read_u32_le(data)?.into())),
        ValueType::DwordBigEndian => Ok(Value::Int(read_u32_be(data)?.into())),
        ValueType::Qword => Ok(Value::Int(read_u64_le(data)?)),
        _ => Ok(Value::Bytes(data.to_vec())),
    }
}

fn encode_multi_string(items: &[String]) -> Result<Vec<u8>> {
    if items.iter().any(String::is_empty) {
        return Err(RegistryError::InvalidData(
            "REG_MULTI_SZ cannot hold an empty string".to_string(),
        ));
    }
    let mut data = Vec::new();
    for item in items {
        check_no_nul(item, ValueType::MultiString)?;
        write_utf16_string(&mut data, item);
    }
    data.extend_from_slice(&[0, 0]);
    Ok(data)
}

// NUL terminates stored strings and separates list items.
fn check_no_nul(text: &str, value_type: ValueType) -> Result<()> {
    if text.contains('\0') {
        return Err(RegistryError::InvalidData(format!(
            "{} cannot hold an embedded NUL character",
            value_type
        )));
    }
    Ok(())
}

fn to_u32(n: u64, value_type: ValueType) -> Result<u32> {
    u32::try_from(n).map_err(|_| {
        RegistryError::UnsupportedType(format!("integer {} does not fit {}", n, value_type))
    })
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::None => "no data",
        Value::Bytes(_) => "bytes",
        Value::Int(_) => "an integer",
        Value::Str(_) => "a string",
        Value::StrList(_) => "a string list",
    }
}

//! Utility functions for value byte layouts and name comparison.

use crate::error::{RegistryError, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use encoding_rs::UTF_16LE;

/// Folds a key or value name for case-insensitive comparison.
///
/// Names are folded to upper case, the way the native registry compares
/// them. Sorting by the folded form therefore places `_` after letters.
pub fn fold_case(name: &str) -> String {
    name.to_uppercase()
}

/// Reads a UTF-16LE string from a byte slice, trimming null terminators.
///
/// Registry strings are typically null-terminated. This function decodes
/// UTF-16LE data and removes trailing null characters.
///
/// # Errors
///
/// Returns an error if the data length is not even (UTF-16 requires 2-byte units)
/// or if the UTF-16 decoding fails.
pub fn read_utf16_string(data: &[u8]) -> Result<String> {
    if data.is_empty() {
        return Ok(String::new());
    }

    // UTF-16 requires even number of bytes
    if data.len() % 2 != 0 {
        return Err(RegistryError::InvalidUtf16);
    }

    let (decoded, had_errors) = UTF_16LE.decode_without_bom_handling(data);

    if had_errors {
        return Err(RegistryError::InvalidUtf16);
    }

    Ok(decoded.trim_end_matches('\0').to_string())
}

/// Writes a string as UTF-16LE code units followed by a null terminator.
pub fn write_utf16_string(out: &mut Vec<u8>, text: &str) {
    for unit in text.encode_utf16().chain(std::iter::once(0)) {
        // Writing into a Vec cannot fail.
        let _ = out.write_u16::<LittleEndian>(unit);
    }
}

/// Reads a little-endian u32 from the start of the slice.
pub fn read_u32_le(data: &[u8]) -> Result<u32> {
    ensure_len(data, 4)?;
    Ok(LittleEndian::read_u32(data))
}

/// Reads a big-endian u32 from the start of the slice.
pub fn read_u32_be(data: &[u8]) -> Result<u32> {
    ensure_len(data, 4)?;
    Ok(BigEndian::read_u32(data))
}

/// Reads a little-endian u64 from the start of the slice.
pub fn read_u64_le(data: &[u8]) -> Result<u64> {
    ensure_len(data, 8)?;
    Ok(LittleEndian::read_u64(data))
}

fn ensure_len(data: &[u8], expected: usize) -> Result<()> {
    if data.len() < expected {
        return Err(RegistryError::TruncatedData {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf16_round_trip() {
        let mut buf = Vec::new();
        write_utf16_string(&mut buf, "regkit");
        assert_eq!(buf.len(), ("regkit".len() + 1) * 2);
        assert_eq!(&buf[buf.len() - 2..], &[0, 0]);
        assert_eq!(read_utf16_string(&buf).unwrap(), "regkit");
    }

    #[test]
    fn test_utf16_non_ascii() {
        let mut buf = Vec::new();
        write_utf16_string(&mut buf, "Grüße 🦀");
        assert_eq!(read_utf16_string(&buf).unwrap(), "Grüße 🦀");
    }

    #[test]
    fn test_utf16_odd_length() {
        assert!(matches!(
            read_utf16_string(&[0x41, 0x00, 0x42]),
            Err(RegistryError::InvalidUtf16)
        ));
    }

    #[test]
    fn test_utf16_lone_surrogate() {
        assert!(read_utf16_string(&[0x00, 0xD8]).is_err());
    }

    #[test]
    fn test_read_u32_le() {
        let data = [0x01, 0x02, 0x03, 0x04];
        assert_eq!(read_u32_le(&data).unwrap(), 0x04030201);
        assert_eq!(read_u32_be(&data).unwrap(), 0x01020304);
    }

    #[test]
    fn test_truncated() {
        let err = read_u64_le(&[0u8; 5]).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::TruncatedData {
                expected: 8,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_fold_case() {
        assert_eq!(fold_case("Software"), fold_case("SOFTWARE"));
        assert_eq!(fold_case("Software"), "SOFTWARE");
        assert_eq!(fold_case("straße"), fold_case("STRASSE"));
        assert!(fold_case("Zeta") < fold_case("_private"));
    }
}

//! Hexadecimal encoding.

use std::fmt;

/// Encode bytes as a lowercase hex string.
///
/// ```
/// use snmp_cache::format::hex::encode;
///
/// assert_eq!(encode(&[0x00, 0x1a, 0x2b]), "001a2b");
/// ```
pub fn encode(bytes: &[u8]) -> String {
    Bytes(bytes).to_string()
}

/// Decode a hex string. Test vectors only.
#[cfg(test)]
pub(crate) fn decode(s: &str) -> Result<Vec<u8>, std::num::ParseIntError> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2).unwrap_or("x"), 16))
        .collect()
}

/// Lazy hex formatter for log fields.
///
/// ```
/// use snmp_cache::format::hex::Bytes;
///
/// assert_eq!(format!("{}", Bytes(&[0xde, 0xad])), "dead");
/// ```
pub struct Bytes<'a>(pub &'a [u8]);

impl fmt::Debug for Bytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Display for Bytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

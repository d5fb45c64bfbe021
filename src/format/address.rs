//! MAC and IP address conversions for values and table indices.
//!
//! ```
//! use snmp_cache::format::{mac_binary_to_hex, mac_decimal_to_hex, normalize_mac};
//!
//! assert_eq!(mac_decimal_to_hex("0.26.43.60.77.94").unwrap(), "001a2b3c4d5e");
//! assert_eq!(mac_binary_to_hex(&[0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e]), "001a2b3c4d5e");
//! assert_eq!(normalize_mac("00-1A-2B-3C-4D-5E", ":"), "00:1A:2B:3C:4D:5E");
//! ```

use std::fmt::Write;
use std::num::ParseIntError;

use super::hex;

/// Convert a dotted-decimal MAC (as found in table indices) to hex.
///
/// Each octet becomes at least two hex digits. Fails on a non-numeric
/// octet.
pub fn mac_decimal_to_hex(mac: &str) -> Result<String, ParseIntError> {
    let mut out = String::with_capacity(12);
    for octet in mac.split('.') {
        let value: u32 = octet.trim().parse()?;
        let _ = write!(out, "{:02x}", value);
    }
    Ok(out)
}

/// Lowercase hex, two digits per byte.
pub fn mac_binary_to_hex(mac: &[u8]) -> String {
    hex::encode(mac)
}

/// Bytes joined with `.`.
pub fn ip_binary_to_str(ip: &[u8]) -> String {
    let mut out = String::with_capacity(ip.len() * 4);
    for (i, b) in ip.iter().enumerate() {
        if i > 0 {
            out.push('.');
        }
        let _ = write!(out, "{}", b);
    }
    out
}

/// Strip `:` and `-`, then regroup as six pairs joined by `delimiter`.
///
/// Short input yields short (possibly empty) groups rather than an error.
pub fn normalize_mac(mac: &str, delimiter: &str) -> String {
    let text: Vec<char> = mac.chars().filter(|c| *c != ':' && *c != '-').collect();
    (0..6)
        .map(|i| {
            let start = (i * 2).min(text.len());
            let end = (i * 2 + 2).min(text.len());
            text[start..end].iter().collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(delimiter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_mac() {
        assert_eq!(mac_decimal_to_hex("0.26.43.60.77.94").unwrap(), "001a2b3c4d5e");
        assert_eq!(mac_decimal_to_hex("255.255.255.255.255.255").unwrap(), "ffffffffffff");
        assert!(mac_decimal_to_hex("0.26.x.60.77.94").is_err());
        assert!(mac_decimal_to_hex("").is_err());
    }

    #[test]
    fn binary_mac() {
        assert_eq!(mac_binary_to_hex(&[0x0a, 0x0b, 0x0c, 0xd0, 0xe0, 0xf0]), "0a0b0cd0e0f0");
        assert_eq!(mac_binary_to_hex(&[]), "");
    }

    #[test]
    fn ip_bytes() {
        assert_eq!(ip_binary_to_str(&[192, 168, 1, 254]), "192.168.1.254");
        assert_eq!(ip_binary_to_str(&[10]), "10");
        assert_eq!(ip_binary_to_str(&[]), "");
    }

    #[test]
    fn normalize() {
        assert_eq!(normalize_mac("001a2b3c4d5e", ":"), "00:1a:2b:3c:4d:5e");
        assert_eq!(normalize_mac("00:1a:2b:3c:4d:5e", ""), "001a2b3c4d5e");
        assert_eq!(normalize_mac("00-1a-2b-3c-4d-5e", "-"), "00-1a-2b-3c-4d-5e");
        assert_eq!(normalize_mac("001a", "."), "00.1a....");
    }
}

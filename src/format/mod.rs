//! Value formatting.
//!
//! [`format_snmp_field`] turns a raw [`Value`](crate::Value) into JSON using
//! the object's MIB syntax, and [`parse_table_index`] splits a row index
//! into its index objects. The address helpers are shared by both.
//!
//! ```
//! use snmp_cache::format::{bytes_to_str, hex, ip_binary_to_str};
//!
//! assert_eq!(ip_binary_to_str(&[10, 1, 2, 3]), "10.1.2.3");
//! assert_eq!(bytes_to_str(b"eth0").unwrap(), "eth0");
//! assert_eq!(hex::encode(&[0xde, 0xad]), "dead");
//! ```

mod address;
mod field;
pub mod hex;

pub use address::{ip_binary_to_str, mac_binary_to_hex, mac_decimal_to_hex, normalize_mac};
pub use field::{format_snmp_field, parse_table_index, raw_json};

/// Strict UTF-8 view of a byte string.
pub fn bytes_to_str(bytes: &[u8]) -> Result<&str, std::str::Utf8Error> {
    std::str::from_utf8(bytes)
}

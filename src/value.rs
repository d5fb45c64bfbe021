//! SNMP value types.
//!
//! The `Value` enum represents all SNMP data types including exceptions.

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::Result;
use crate::format::hex;
use crate::oid::Oid;
use bytes::Bytes;

/// SNMP value.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    /// INTEGER (signed 32-bit)
    Integer(i32),
    /// OCTET STRING (arbitrary bytes, not necessarily text)
    OctetString(Bytes),
    Null,
    ObjectIdentifier(Oid),
    /// IpAddress (4 bytes, network order)
    IpAddress([u8; 4]),
    /// Counter32 (wrapping)
    Counter32(u32),
    /// Gauge32 / Unsigned32
    Gauge32(u32),
    /// TimeTicks (hundredths of a second)
    TimeTicks(u32),
    Opaque(Bytes),
    /// Counter64 (SNMPv2c/v3 only)
    Counter64(u64),
    /// noSuchObject exception: the agent does not implement the object.
    NoSuchObject,
    /// noSuchInstance exception: the object exists but this instance does not.
    NoSuchInstance,
    /// endOfMibView exception: nothing follows the requested OID.
    ///
    /// This is the normal termination of a GETNEXT/GETBULK walk.
    EndOfMibView,
    /// Unrecognized tag, kept as-is.
    Unknown { tag: u8, data: Bytes },
}

impl Value {
    /// Signed view of the numeric types.
    ///
    /// ```
    /// use snmp_cache::Value;
    ///
    /// assert_eq!(Value::Integer(-3).as_i64(), Some(-3));
    /// assert_eq!(Value::Counter64(7).as_i64(), Some(7));
    /// assert_eq!(Value::Null.as_i64(), None);
    /// ```
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(i64::from(*v)),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(i64::from(*v)),
            Value::Counter64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Integer(v) => u64::try_from(*v).ok(),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(u64::from(*v)),
            Value::Counter64(v) => Some(*v),
            _ => None,
        }
    }

    /// Raw bytes of OctetString, Opaque and IpAddress values.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(data) | Value::Opaque(data) => Some(data),
            Value::IpAddress(addr) => Some(addr),
            _ => None,
        }
    }

    /// OctetString as UTF-8 text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::OctetString(data) => std::str::from_utf8(data).ok(),
            _ => None,
        }
    }

    pub fn as_oid(&self) -> Option<&Oid> {
        match self {
            Value::ObjectIdentifier(oid) => Some(oid),
            _ => None,
        }
    }

    /// True for the integer-like SMI types.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Integer(_)
                | Value::Counter32(_)
                | Value::Gauge32(_)
                | Value::TimeTicks(_)
                | Value::Counter64(_)
        )
    }

    /// True for noSuchObject, noSuchInstance and endOfMibView.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            Value::Integer(v) => buf.push_integer(*v),
            Value::OctetString(data) => buf.push_octet_string(data),
            Value::Null => buf.push_null(),
            Value::ObjectIdentifier(oid) => buf.push_oid(oid),
            Value::IpAddress(addr) => buf.push_ip_address(*addr),
            Value::Counter32(v) => buf.push_unsigned32(tag::application::COUNTER32, *v),
            Value::Gauge32(v) => buf.push_unsigned32(tag::application::GAUGE32, *v),
            Value::TimeTicks(v) => buf.push_unsigned32(tag::application::TIMETICKS, *v),
            Value::Opaque(data) => push_raw(buf, tag::application::OPAQUE, data),
            Value::Counter64(v) => buf.push_integer64(*v),
            Value::NoSuchObject => push_raw(buf, tag::context::NO_SUCH_OBJECT, &[]),
            Value::NoSuchInstance => push_raw(buf, tag::context::NO_SUCH_INSTANCE, &[]),
            Value::EndOfMibView => push_raw(buf, tag::context::END_OF_MIB_VIEW, &[]),
            Value::Unknown { tag, data } => push_raw(buf, *tag, data),
        }
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let tag = decoder.read_tag()?;
        let len = decoder.read_length()?;

        let value = match tag {
            tag::universal::INTEGER => Value::Integer(decoder.read_integer_value(len)?),
            tag::universal::OCTET_STRING => Value::OctetString(decoder.read_bytes(len)?),
            tag::universal::NULL => {
                decoder.read_bytes(len)?;
                Value::Null
            }
            tag::universal::OBJECT_IDENTIFIER => {
                Value::ObjectIdentifier(decoder.read_oid_value(len)?)
            }
            tag::application::IP_ADDRESS => Value::IpAddress(decoder.read_ip_address_value(len)?),
            tag::application::COUNTER32 => Value::Counter32(decoder.read_unsigned32_value(len)?),
            tag::application::GAUGE32 => Value::Gauge32(decoder.read_unsigned32_value(len)?),
            tag::application::TIMETICKS => Value::TimeTicks(decoder.read_unsigned32_value(len)?),
            tag::application::OPAQUE => Value::Opaque(decoder.read_bytes(len)?),
            tag::application::COUNTER64 => Value::Counter64(decoder.read_integer64_value(len)?),
            tag::context::NO_SUCH_OBJECT => {
                decoder.read_bytes(len)?;
                Value::NoSuchObject
            }
            tag::context::NO_SUCH_INSTANCE => {
                decoder.read_bytes(len)?;
                Value::NoSuchInstance
            }
            tag::context::END_OF_MIB_VIEW => {
                decoder.read_bytes(len)?;
                Value::EndOfMibView
            }
            // constructed OCTET STRING: net-snmp does not parse it either
            0x24 => return Err(decoder.malformed("constructed OCTET STRING")),
            _ => Value::Unknown {
                tag,
                data: decoder.read_bytes(len)?,
            },
        };

        Ok(value)
    }
}

fn push_raw(buf: &mut EncodeBuf, tag: u8, data: &[u8]) {
    buf.push_bytes(data);
    buf.push_length(data.len());
    buf.push_tag(tag);
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::OctetString(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "{}", s),
                Err(_) => write!(f, "0x{}", hex::Bytes(data)),
            },
            Value::Null => write!(f, "NULL"),
            Value::ObjectIdentifier(oid) => write!(f, "{}", oid),
            Value::IpAddress([a, b, c, d]) => write!(f, "{}.{}.{}.{}", a, b, c, d),
            Value::Counter32(v) | Value::Gauge32(v) => write!(f, "{}", v),
            Value::TimeTicks(v) => {
                let secs = v / 100;
                write!(
                    f,
                    "{}d {}h {}m {}s",
                    secs / 86400,
                    (secs % 86400) / 3600,
                    (secs % 3600) / 60,
                    secs % 60
                )
            }
            Value::Opaque(data) => write!(f, "Opaque(0x{})", hex::Bytes(data)),
            Value::Counter64(v) => write!(f, "{}", v),
            Value::NoSuchObject => write!(f, "noSuchObject"),
            Value::NoSuchInstance => write!(f, "noSuchInstance"),
            Value::EndOfMibView => write!(f, "endOfMibView"),
            Value::Unknown { tag, data } => {
                write!(f, "Unknown(tag=0x{:02X}, data=0x{})", tag, hex::Bytes(data))
            }
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<&[u8]> for Value {
    fn from(data: &[u8]) -> Self {
        Value::OctetString(Bytes::copy_from_slice(data))
    }
}

impl From<Bytes> for Value {
    fn from(data: Bytes) -> Self {
        Value::OctetString(data)
    }
}

impl From<Oid> for Value {
    fn from(oid: Oid) -> Self {
        Value::ObjectIdentifier(oid)
    }
}

impl From<std::net::Ipv4Addr> for Value {
    fn from(addr: std::net::Ipv4Addr) -> Self {
        Value::IpAddress(addr.octets())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Counter64(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    fn reencode(value: &Value) -> Value {
        let mut buf = EncodeBuf::new();
        value.encode(&mut buf);
        let mut dec = Decoder::new(buf.finish());
        Value::decode(&mut dec).unwrap()
    }

    #[test]
    fn every_variant_survives_the_wire() {
        let values = [
            Value::Integer(i32::MIN),
            Value::OctetString(Bytes::from_static(&[0x00, 0x1a, 0xff])),
            Value::Null,
            Value::ObjectIdentifier(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1)),
            Value::IpAddress([10, 0, 0, 254]),
            Value::Counter32(u32::MAX),
            Value::Gauge32(1_000_000_000),
            Value::TimeTicks(123_456),
            Value::Opaque(Bytes::from_static(b"\x9f\x78\x04")),
            Value::Counter64(u64::MAX),
            Value::NoSuchObject,
            Value::NoSuchInstance,
            Value::EndOfMibView,
        ];
        for value in &values {
            assert_eq!(&reencode(value), value);
        }
    }

    #[test]
    fn unknown_tag_is_preserved() {
        let mut dec = Decoder::from_slice(&[0x47, 0x02, 0xAB, 0xCD]);
        assert_eq!(
            Value::decode(&mut dec).unwrap(),
            Value::Unknown {
                tag: 0x47,
                data: Bytes::from_static(&[0xAB, 0xCD])
            }
        );
    }

    #[test]
    fn constructed_octet_string_rejected() {
        let mut dec = Decoder::from_slice(&[0x24, 0x03, 0x04, 0x01, 0x41]);
        assert!(Value::decode(&mut dec).is_err());
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::TimeTicks(9_000_000).to_string(), "1d 1h 0m 0s");
        assert_eq!(Value::from("eth0").to_string(), "eth0");
        assert_eq!(
            Value::OctetString(Bytes::from_static(&[0xff, 0x00])).to_string(),
            "0xff00"
        );
        assert_eq!(Value::IpAddress([192, 0, 2, 1]).to_string(), "192.0.2.1");
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::IpAddress([1, 2, 3, 4]).as_bytes(), Some(&[1, 2, 3, 4][..]));
        assert!(Value::TimeTicks(1).is_numeric());
        assert!(Value::EndOfMibView.is_exception());
        assert_eq!(Value::Integer(-1).as_u64(), None);
    }
}

//! BER decoding.
//!
//! Zero-copy: nested structures and octet strings are `Bytes` slices of the
//! received datagram.

use std::net::SocketAddr;

use bytes::Bytes;

use super::length::decode_length;
use super::tag;
use crate::error::{Error, Result, UNKNOWN_TARGET};
use crate::oid::Oid;

/// BER decoder that reads from a byte buffer.
pub struct Decoder {
    data: Bytes,
    offset: usize,
    target: Option<SocketAddr>,
}

impl Decoder {
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            offset: 0,
            target: None,
        }
    }

    /// Create a decoder that reports `target` in its errors.
    pub fn with_target(data: Bytes, target: SocketAddr) -> Self {
        Self {
            data,
            offset: 0,
            target: Some(target),
        }
    }

    /// Create a decoder from a byte slice (copies the data).
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    fn target(&self) -> SocketAddr {
        self.target.unwrap_or(UNKNOWN_TARGET)
    }

    /// Log the decode failure and build the public error.
    pub(crate) fn malformed(&self, reason: &'static str) -> Box<Error> {
        tracing::debug!(target: "snmp_cache::ber", { snmp.offset = self.offset, snmp.decode_error = reason }, "BER decode failed");
        Error::MalformedResponse {
            target: self.target(),
        }
        .boxed()
    }

    fn child(&self, data: Bytes) -> Decoder {
        Decoder {
            data,
            offset: 0,
            target: self.target,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    /// Peek at the next tag without consuming it.
    pub fn peek_tag(&self) -> Option<u8> {
        self.data.get(self.offset).copied()
    }

    pub fn read_tag(&mut self) -> Result<u8> {
        let tag = self
            .data
            .get(self.offset)
            .copied()
            .ok_or_else(|| self.malformed("unexpected end of input"))?;
        self.offset += 1;
        Ok(tag)
    }

    pub fn read_length(&mut self) -> Result<usize> {
        let rest = self.data.get(self.offset..).unwrap_or_default();
        let (len, consumed) = decode_length(rest, self.offset, self.target)?;
        self.offset += consumed;
        Ok(len)
    }

    /// Read `len` raw bytes without copying.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        let end = self.offset.saturating_add(len);
        if end > self.data.len() {
            return Err(self.malformed("insufficient data"));
        }
        let bytes = self.data.slice(self.offset..end);
        self.offset = end;
        Ok(bytes)
    }

    /// Read a tag, check it, and return the content length.
    pub fn expect_tag(&mut self, expected: u8) -> Result<usize> {
        let actual = self.read_tag()?;
        if actual != expected {
            tracing::debug!(target: "snmp_cache::ber", { snmp.offset = self.offset - 1, expected, actual }, "unexpected tag");
            return Err(Error::MalformedResponse {
                target: self.target(),
            }
            .boxed());
        }
        self.read_length()
    }

    pub fn read_integer(&mut self) -> Result<i32> {
        let len = self.expect_tag(tag::universal::INTEGER)?;
        self.read_integer_value(len)
    }

    /// Read a signed integer body. Bodies longer than four bytes are
    /// truncated to their leading four, matching net-snmp.
    pub fn read_integer_value(&mut self, len: usize) -> Result<i32> {
        if len == 0 {
            return Err(self.malformed("zero-length integer"));
        }
        if len > 4 {
            tracing::warn!(target: "snmp_cache::ber", { snmp.offset = self.offset, length = len }, "integer too long, truncating to 4 bytes");
        }
        let bytes = self.read_bytes(len)?;
        let seed: i32 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
        Ok(bytes
            .iter()
            .take(4)
            .fold(seed, |acc, &b| (acc << 8) | i32::from(b)))
    }

    /// Read an unsigned 64-bit body (Counter64). At most nine bytes.
    pub fn read_integer64_value(&mut self, len: usize) -> Result<u64> {
        if len == 0 {
            return Err(self.malformed("zero-length integer"));
        }
        if len > 9 {
            return Err(self.malformed("integer64 too long"));
        }
        let bytes = self.read_bytes(len)?;
        Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
    }

    pub fn read_unsigned32(&mut self, expected_tag: u8) -> Result<u32> {
        let len = self.expect_tag(expected_tag)?;
        self.read_unsigned32_value(len)
    }

    /// Read an unsigned 32-bit body. At most five bytes (leading zero plus four).
    pub fn read_unsigned32_value(&mut self, len: usize) -> Result<u32> {
        if len == 0 {
            return Err(self.malformed("zero-length integer"));
        }
        if len > 5 {
            return Err(self.malformed("unsigned32 too long"));
        }
        let bytes = self.read_bytes(len)?;
        let wide = bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
        u32::try_from(wide).map_err(|_| self.malformed("unsigned32 out of range"))
    }

    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        let len = self.expect_tag(tag::universal::OCTET_STRING)?;
        self.read_bytes(len)
    }

    pub fn read_null(&mut self) -> Result<()> {
        let len = self.expect_tag(tag::universal::NULL)?;
        if len != 0 {
            return Err(self.malformed("NULL with non-zero length"));
        }
        Ok(())
    }

    pub fn read_oid(&mut self) -> Result<Oid> {
        let len = self.expect_tag(tag::universal::OBJECT_IDENTIFIER)?;
        self.read_oid_value(len)
    }

    pub fn read_oid_value(&mut self, len: usize) -> Result<Oid> {
        let bytes = self.read_bytes(len)?;
        Oid::from_ber(&bytes).map_err(|_| self.malformed("invalid OID encoding"))
    }

    /// Read a SEQUENCE, returning a decoder over its contents.
    pub fn read_sequence(&mut self) -> Result<Decoder> {
        self.read_constructed(tag::universal::SEQUENCE)
    }

    /// Read a constructed TLV with `expected_tag`, returning a decoder over
    /// its contents.
    pub fn read_constructed(&mut self, expected_tag: u8) -> Result<Decoder> {
        let len = self.expect_tag(expected_tag)?;
        let content = self.read_bytes(len)?;
        Ok(self.child(content))
    }

    pub fn read_ip_address_value(&mut self, len: usize) -> Result<[u8; 4]> {
        if len != 4 {
            return Err(self.malformed("IP address must be 4 bytes"));
        }
        let bytes = self.read_bytes(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Skip one TLV without interpreting it.
    pub fn skip_tlv(&mut self) -> Result<()> {
        self.read_tag()?;
        let len = self.read_length()?;
        self.read_bytes(len).map(|_| ())
    }

    /// Split off the next `len` bytes as their own decoder.
    pub fn sub_decoder(&mut self, len: usize) -> Result<Decoder> {
        let content = self.read_bytes(len)?;
        Ok(self.child(content))
    }

    /// The whole underlying buffer, independent of the read position.
    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    pub fn remaining_slice(&self) -> &[u8] {
        self.data.get(self.offset..).unwrap_or_default()
    }
}

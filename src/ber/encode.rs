//! BER encoding.
//!
//! [`EncodeBuf`] stores bytes back to front. Callers push the *last* field of
//! a structure first; constructed helpers measure what their closure wrote and
//! prepend the header afterwards.

use bytes::Bytes;

use super::length::encode_length;
use super::tag;
use crate::oid::Oid;

/// Reverse-writing BER encode buffer.
#[derive(Debug, Default)]
pub struct EncodeBuf {
    // bytes in reverse order
    buf: Vec<u8>,
}

impl EncodeBuf {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(256),
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Prepend raw bytes.
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buf.extend(data.iter().rev());
    }

    pub fn push_tag(&mut self, tag: u8) {
        self.buf.push(tag);
    }

    pub fn push_length(&mut self, len: usize) {
        let (bytes, n) = encode_length(len);
        self.buf.extend_from_slice(&bytes[..n]);
    }

    /// Prepend a constructed TLV whose contents are written by `f`.
    ///
    /// Inside `f`, fields must be pushed in reverse order.
    pub fn push_constructed(&mut self, tag: u8, f: impl FnOnce(&mut EncodeBuf)) {
        let start = self.buf.len();
        f(self);
        let content_len = self.buf.len() - start;
        self.push_length(content_len);
        self.push_tag(tag);
    }

    /// Prepend a SEQUENCE whose contents are written by `f`.
    pub fn push_sequence(&mut self, f: impl FnOnce(&mut EncodeBuf)) {
        self.push_constructed(tag::universal::SEQUENCE, f);
    }

    /// Prepend a primitive TLV.
    fn push_primitive(&mut self, tag: u8, content: &[u8]) {
        self.push_bytes(content);
        self.push_length(content.len());
        self.push_tag(tag);
    }

    /// Prepend a signed INTEGER in minimal two's complement form.
    pub fn push_integer(&mut self, value: i32) {
        let bytes = value.to_be_bytes();
        let mut start = 0;
        while start < 3 {
            let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
                || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
            if !redundant {
                break;
            }
            start += 1;
        }
        self.push_primitive(tag::universal::INTEGER, &bytes[start..]);
    }

    /// Prepend an unsigned 32-bit value with an application tag
    /// (Counter32, Gauge32, TimeTicks).
    pub fn push_unsigned32(&mut self, tag: u8, value: u32) {
        self.push_unsigned(tag, &value.to_be_bytes());
    }

    /// Prepend a Counter64.
    pub fn push_integer64(&mut self, value: u64) {
        self.push_unsigned(tag::application::COUNTER64, &value.to_be_bytes());
    }

    fn push_unsigned(&mut self, tag: u8, be: &[u8]) {
        let first = be
            .iter()
            .position(|&b| b != 0)
            .unwrap_or(be.len() - 1);
        let digits = &be[first..];
        self.push_bytes(digits);
        let mut len = digits.len();
        // keep the value positive
        if digits[0] & 0x80 != 0 {
            self.buf.push(0x00);
            len += 1;
        }
        self.push_length(len);
        self.push_tag(tag);
    }

    pub fn push_octet_string(&mut self, data: &[u8]) {
        self.push_primitive(tag::universal::OCTET_STRING, data);
    }

    pub fn push_null(&mut self) {
        self.push_primitive(tag::universal::NULL, &[]);
    }

    pub fn push_oid(&mut self, oid: &Oid) {
        self.push_primitive(tag::universal::OBJECT_IDENTIFIER, &oid.to_ber());
    }

    pub fn push_ip_address(&mut self, addr: [u8; 4]) {
        self.push_primitive(tag::application::IP_ADDRESS, &addr);
    }

    /// Finish encoding and return the bytes in wire order.
    pub fn finish(mut self) -> Bytes {
        self.buf.reverse();
        Bytes::from(self.buf)
    }
}

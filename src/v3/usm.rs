//! USM security parameters (RFC 3414 Section 2.4).
//!
//! ```text
//! UsmSecurityParameters ::= SEQUENCE {
//!     msgAuthoritativeEngineID     OCTET STRING,
//!     msgAuthoritativeEngineBoots  INTEGER (0..2147483647),
//!     msgAuthoritativeEngineTime   INTEGER (0..2147483647),
//!     msgUserName                  OCTET STRING (SIZE(0..32)),
//!     msgAuthenticationParameters  OCTET STRING,
//!     msgPrivacyParameters         OCTET STRING
//! }
//! ```

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, decode_length, tag};
use crate::error::Result;

/// USM security parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct UsmSecurityParams {
    pub engine_id: Bytes,
    pub engine_boots: u32,
    /// Seconds since the engine last booted.
    pub engine_time: u32,
    pub username: Bytes,
    /// Truncated HMAC, or empty.
    pub auth_params: Bytes,
    /// Salt, or empty.
    pub priv_params: Bytes,
}

impl UsmSecurityParams {
    pub fn new(
        engine_id: impl Into<Bytes>,
        engine_boots: u32,
        engine_time: u32,
        username: impl Into<Bytes>,
    ) -> Self {
        Self {
            engine_id: engine_id.into(),
            engine_boots,
            engine_time,
            username: username.into(),
            auth_params: Bytes::new(),
            priv_params: Bytes::new(),
        }
    }

    /// Empty parameters, as sent in a discovery request.
    pub fn empty() -> Self {
        Self::new(Bytes::new(), 0, 0, Bytes::new())
    }

    pub fn with_priv_params(mut self, priv_params: impl Into<Bytes>) -> Self {
        self.priv_params = priv_params.into();
        self
    }

    /// Zero-filled auth params; the HMAC replaces them once the whole
    /// message is encoded.
    pub fn with_auth_placeholder(mut self, mac_len: usize) -> Self {
        self.auth_params = Bytes::from(vec![0u8; mac_len]);
        self
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_octet_string(&self.priv_params);
            buf.push_octet_string(&self.auth_params);
            buf.push_octet_string(&self.username);
            buf.push_unsigned32(tag::universal::INTEGER, self.engine_time);
            buf.push_unsigned32(tag::universal::INTEGER, self.engine_boots);
            buf.push_octet_string(&self.engine_id);
        });
        buf.finish()
    }

    pub fn decode(data: Bytes) -> Result<Self> {
        Self::decode_from(&mut Decoder::new(data))
    }

    pub fn decode_from(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;

        let engine_id = seq.read_octet_string()?;

        let raw_boots = seq.read_integer()?;
        let Ok(engine_boots) = u32::try_from(raw_boots) else {
            tracing::debug!(target: "snmp_cache::v3", { snmp.offset = seq.offset(), value = raw_boots }, "negative engine boots");
            return Err(seq.malformed("negative msgAuthoritativeEngineBoots"));
        };

        let raw_time = seq.read_integer()?;
        let Ok(engine_time) = u32::try_from(raw_time) else {
            tracing::debug!(target: "snmp_cache::v3", { snmp.offset = seq.offset(), value = raw_time }, "negative engine time");
            return Err(seq.malformed("negative msgAuthoritativeEngineTime"));
        };

        let username = seq.read_octet_string()?;
        let auth_params = seq.read_octet_string()?;
        let priv_params = seq.read_octet_string()?;

        Ok(Self {
            engine_id,
            engine_boots,
            engine_time,
            username,
            auth_params,
            priv_params,
        })
    }

    /// Locate msgAuthenticationParameters inside a whole encoded v3
    /// message, returning `(offset, length)`.
    pub fn find_auth_params_offset(encoded_msg: &[u8]) -> Option<(usize, usize)> {
        let mut cur = Cursor {
            data: encoded_msg,
            offset: 0,
        };

        // SEQUENCE { version, msgGlobalData, OCTET STRING { SEQUENCE { ...
        cur.enter(tag::universal::SEQUENCE)?;
        cur.skip(tag::universal::INTEGER)?;
        cur.skip(tag::universal::SEQUENCE)?;
        cur.enter(tag::universal::OCTET_STRING)?;
        cur.enter(tag::universal::SEQUENCE)?;

        // engineID, boots, time, userName
        cur.skip(tag::universal::OCTET_STRING)?;
        cur.skip(tag::universal::INTEGER)?;
        cur.skip(tag::universal::INTEGER)?;
        cur.skip(tag::universal::OCTET_STRING)?;

        let len = cur.enter(tag::universal::OCTET_STRING)?;
        if cur.offset + len > encoded_msg.len() {
            return None;
        }
        Some((cur.offset, len))
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl Cursor<'_> {
    /// Consume a tag and length, leaving the position at the content.
    fn enter(&mut self, expected: u8) -> Option<usize> {
        if *self.data.get(self.offset)? != expected {
            return None;
        }
        self.offset += 1;
        let rest = self.data.get(self.offset..)?;
        let (len, consumed) = decode_length(rest, self.offset, None).ok()?;
        self.offset += consumed;
        Some(len)
    }

    fn skip(&mut self, expected: u8) -> Option<()> {
        let len = self.enter(expected)?;
        self.offset += len;
        Some(())
    }
}

//! SNMPv3 message format (RFC 3412).
//!
//! ```text
//! SEQUENCE {
//!     INTEGER version (3)
//!     SEQUENCE msgGlobalData { msgID, msgMaxSize, msgFlags, msgSecurityModel }
//!     OCTET STRING msgSecurityParameters (USM-encoded)
//!     msgData: ScopedPDU, or OCTET STRING ciphertext for authPriv
//! }
//! ```

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf};
use crate::error::Result;
use crate::pdu::Pdu;
use crate::v3::UsmSecurityParams;

/// Smallest msgMaxSize an engine may advertise (RFC 3412 HeaderData).
const MSG_MAX_SIZE_MINIMUM: i32 = 484;

/// Largest UDP payload; what we advertise as msgMaxSize.
pub(crate) const MSG_MAX_SIZE: i32 = 65507;

/// SNMPv3 security model identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SecurityModel {
    /// User-based Security Model (RFC 3414)
    Usm = 3,
}

/// SNMPv3 security level, ordered from least to most secure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecurityLevel {
    NoAuthNoPriv,
    AuthNoPriv,
    AuthPriv,
}

impl SecurityLevel {
    /// Decode from the msgFlags byte. Privacy without authentication is invalid.
    pub fn from_flags(flags: u8) -> Option<Self> {
        match (flags & 0x01 != 0, flags & 0x02 != 0) {
            (false, false) => Some(Self::NoAuthNoPriv),
            (true, false) => Some(Self::AuthNoPriv),
            (true, true) => Some(Self::AuthPriv),
            (false, true) => None,
        }
    }

    /// Encode to msgFlags bits (without the reportable flag).
    pub fn to_flags(self) -> u8 {
        match self {
            Self::NoAuthNoPriv => 0x00,
            Self::AuthNoPriv => 0x01,
            Self::AuthPriv => 0x03,
        }
    }

    pub fn requires_auth(self) -> bool {
        self >= Self::AuthNoPriv
    }

    pub fn requires_priv(self) -> bool {
        self == Self::AuthPriv
    }
}

/// Message flags (RFC 3412 Section 6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgFlags {
    pub security_level: SecurityLevel,
    /// Whether the receiver may answer with a Report PDU.
    pub reportable: bool,
}

impl MsgFlags {
    pub fn new(security_level: SecurityLevel, reportable: bool) -> Self {
        Self {
            security_level,
            reportable,
        }
    }

    pub fn to_byte(self) -> u8 {
        let mut flags = self.security_level.to_flags();
        if self.reportable {
            flags |= 0x04;
        }
        flags
    }
}

/// Message header (msgGlobalData).
#[derive(Debug, Clone, PartialEq)]
pub struct MsgGlobalData {
    pub msg_id: i32,
    pub msg_max_size: i32,
    pub msg_flags: MsgFlags,
    pub msg_security_model: SecurityModel,
}

impl MsgGlobalData {
    pub fn new(msg_id: i32, msg_max_size: i32, msg_flags: MsgFlags) -> Self {
        Self {
            msg_id,
            msg_max_size,
            msg_flags,
            msg_security_model: SecurityModel::Usm,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            buf.push_integer(self.msg_security_model as i32);
            buf.push_octet_string(&[self.msg_flags.to_byte()]);
            buf.push_integer(self.msg_max_size);
            buf.push_integer(self.msg_id);
        });
    }

    /// Decode and validate the header: non-negative msgID, msgMaxSize of at
    /// least 484, a one-byte msgFlags and the USM security model.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;

        let msg_id = seq.read_integer()?;
        if msg_id < 0 {
            return Err(seq.malformed("negative msgID"));
        }

        let msg_max_size = seq.read_integer()?;
        if msg_max_size < MSG_MAX_SIZE_MINIMUM {
            tracing::debug!(target: "snmp_cache::v3", { snmp.msg_max_size = msg_max_size }, "msgMaxSize below minimum");
            return Err(seq.malformed("msgMaxSize out of range"));
        }

        let flags = seq.read_octet_string()?;
        let msg_flags = match flags.as_ref() {
            [byte] => match SecurityLevel::from_flags(*byte) {
                Some(security_level) => MsgFlags::new(security_level, byte & 0x04 != 0),
                None => return Err(seq.malformed("privacy flag without authentication")),
            },
            _ => return Err(seq.malformed("msgFlags must be one byte")),
        };

        if seq.read_integer()? != SecurityModel::Usm as i32 {
            return Err(seq.malformed("unsupported security model"));
        }

        Ok(Self {
            msg_id,
            msg_max_size,
            msg_flags,
            msg_security_model: SecurityModel::Usm,
        })
    }
}

/// contextEngineID, contextName and the PDU.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedPdu {
    pub context_engine_id: Bytes,
    pub context_name: Bytes,
    pub pdu: Pdu,
}

impl ScopedPdu {
    pub fn new(context_engine_id: impl Into<Bytes>, context_name: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self {
            context_engine_id: context_engine_id.into(),
            context_name: context_name.into(),
            pdu,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.context_name);
            buf.push_octet_string(&self.context_engine_id);
        });
    }

    /// Standalone encoding, the plaintext input for encryption.
    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        self.encode(&mut buf);
        buf.finish()
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let context_engine_id = seq.read_octet_string()?;
        let context_name = seq.read_octet_string()?;
        let pdu = Pdu::decode(&mut seq)?;
        Ok(Self {
            context_engine_id,
            context_name,
            pdu,
        })
    }
}

/// msgData payload.
#[derive(Debug, Clone, PartialEq)]
pub enum V3MessageData {
    Plaintext(ScopedPdu),
    /// Ciphertext of a ScopedPDU (authPriv).
    Encrypted(Bytes),
}

/// SNMPv3 message.
#[derive(Debug, Clone, PartialEq)]
pub struct V3Message {
    pub global_data: MsgGlobalData,
    /// USM-encoded security parameters.
    pub security_params: Bytes,
    pub data: V3MessageData,
}

impl V3Message {
    pub fn new(global_data: MsgGlobalData, security_params: Bytes, data: V3MessageData) -> Self {
        Self {
            global_data,
            security_params,
            data,
        }
    }

    pub fn scoped_pdu(&self) -> Option<&ScopedPdu> {
        match &self.data {
            V3MessageData::Plaintext(scoped) => Some(scoped),
            V3MessageData::Encrypted(_) => None,
        }
    }

    pub fn pdu(&self) -> Option<&Pdu> {
        self.scoped_pdu().map(|s| &s.pdu)
    }

    pub fn into_pdu(self) -> Option<Pdu> {
        match self.data {
            V3MessageData::Plaintext(scoped) => Some(scoped.pdu),
            V3MessageData::Encrypted(_) => None,
        }
    }

    pub fn msg_id(&self) -> i32 {
        self.global_data.msg_id
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.global_data.msg_flags.security_level
    }

    /// Encode to BER.
    ///
    /// Authenticated messages are encoded with a zeroed auth-params
    /// placeholder; the HMAC is written into the finished bytes afterwards.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            match &self.data {
                V3MessageData::Plaintext(scoped) => scoped.encode(buf),
                V3MessageData::Encrypted(ciphertext) => buf.push_octet_string(ciphertext),
            }
            buf.push_octet_string(&self.security_params);
            self.global_data.encode(buf);
            buf.push_integer(3);
        });
        buf.finish()
    }

    /// Decode the remainder of a message whose version has been read.
    pub(crate) fn decode_from_sequence(seq: &mut Decoder) -> Result<Self> {
        let global_data = MsgGlobalData::decode(seq)?;
        let security_params = seq.read_octet_string()?;

        let data = if global_data.msg_flags.security_level.requires_priv() {
            V3MessageData::Encrypted(seq.read_octet_string()?)
        } else {
            V3MessageData::Plaintext(ScopedPdu::decode(seq)?)
        };

        Ok(Self {
            global_data,
            security_params,
            data,
        })
    }

    /// Engine discovery request (RFC 3414 Section 4): noAuthNoPriv, reportable,
    /// empty security parameters and an empty GetRequest.
    pub fn discovery_request(msg_id: i32) -> Self {
        let global_data = MsgGlobalData::new(
            msg_id,
            MSG_MAX_SIZE,
            MsgFlags::new(SecurityLevel::NoAuthNoPriv, true),
        );
        let scoped = ScopedPdu::new(Bytes::new(), Bytes::new(), Pdu::get_request(0, &[]));
        Self::new(
            global_data,
            UsmSecurityParams::empty().encode(),
            V3MessageData::Plaintext(scoped),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::oid;

    #[test]
    fn security_level_flags() {
        assert_eq!(SecurityLevel::AuthPriv.to_flags(), 0x03);
        assert_eq!(SecurityLevel::from_flags(0x05), Some(SecurityLevel::AuthNoPriv));
        assert_eq!(SecurityLevel::from_flags(0x02), None);
        assert!(SecurityLevel::AuthPriv.requires_auth());
        assert!(!SecurityLevel::AuthNoPriv.requires_priv());
        assert_eq!(MsgFlags::new(SecurityLevel::AuthPriv, true).to_byte(), 0x07);
    }

    #[test]
    fn global_data_rejects_small_max_size() {
        let global = MsgGlobalData::new(1, 100, MsgFlags::new(SecurityLevel::NoAuthNoPriv, true));
        let mut buf = EncodeBuf::new();
        global.encode(&mut buf);
        assert!(MsgGlobalData::decode(&mut Decoder::new(buf.finish())).is_err());
    }

    #[test]
    fn plaintext_message_decodes() {
        let scoped = ScopedPdu::new(
            Bytes::from_static(b"\x80\x00\x1f\x88\x04"),
            Bytes::new(),
            Pdu::get_request(42, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]),
        );
        let msg = V3Message::new(
            MsgGlobalData::new(42, MSG_MAX_SIZE, MsgFlags::new(SecurityLevel::NoAuthNoPriv, true)),
            UsmSecurityParams::empty().encode(),
            V3MessageData::Plaintext(scoped),
        );
        match Message::decode(msg.encode()).unwrap() {
            Message::V3(decoded) => assert_eq!(decoded, msg),
            other => panic!("expected v3 message, got {other:?}"),
        }
    }

    #[test]
    fn encrypted_payload_stays_opaque() {
        let msg = V3Message::new(
            MsgGlobalData::new(7, MSG_MAX_SIZE, MsgFlags::new(SecurityLevel::AuthPriv, true)),
            UsmSecurityParams::empty().encode(),
            V3MessageData::Encrypted(Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef])),
        );
        let Message::V3(decoded) = Message::decode(msg.encode()).unwrap() else {
            panic!("expected v3 message");
        };
        assert!(decoded.pdu().is_none());
        assert_eq!(decoded.security_level(), SecurityLevel::AuthPriv);
    }
}

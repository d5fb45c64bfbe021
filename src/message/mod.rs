//! SNMP message wrappers.
//!
//! - [`CommunityMessage`]: v1/v2c, community string authentication
//! - [`V3Message`]: v3 with USM security parameters

mod community;
mod v3;

pub use community::CommunityMessage;
pub(crate) use v3::MSG_MAX_SIZE;
pub use v3::{
    MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, SecurityModel, V3Message, V3MessageData,
};

use std::net::SocketAddr;

use crate::ber::Decoder;
use crate::error::{Result, UNKNOWN_TARGET};
use crate::pdu::Pdu;
use crate::version::Version;
use bytes::Bytes;

/// Decoded SNMP message (any version).
#[derive(Debug)]
pub enum Message {
    Community(CommunityMessage),
    V3(V3Message),
}

impl Message {
    /// The PDU, or `None` for a still-encrypted v3 message.
    pub fn try_pdu(&self) -> Option<&Pdu> {
        match self {
            Message::Community(m) => Some(&m.pdu),
            Message::V3(m) => m.pdu(),
        }
    }

    pub fn try_into_pdu(self) -> Option<Pdu> {
        match self {
            Message::Community(m) => Some(m.pdu),
            Message::V3(m) => m.into_pdu(),
        }
    }

    pub fn version(&self) -> Version {
        match self {
            Message::Community(m) => m.version,
            Message::V3(_) => Version::V3,
        }
    }

    /// Decode a message of any version.
    pub fn decode(data: Bytes) -> Result<Self> {
        Self::decode_from(data, UNKNOWN_TARGET)
    }

    /// Decode a message received from `target`; decode errors name it.
    pub fn decode_from(data: Bytes, target: SocketAddr) -> Result<Self> {
        let mut decoder = Decoder::with_target(data, target);
        let mut seq = decoder.read_sequence()?;

        let version_num = seq.read_integer()?;
        let Some(version) = Version::from_i32(version_num) else {
            tracing::debug!(target: "snmp_cache::ber", { snmp.version = version_num }, "unknown SNMP version");
            return Err(seq.malformed("unknown SNMP version"));
        };

        match version {
            Version::V1 | Version::V2c => {
                CommunityMessage::decode_from_sequence(&mut seq, version).map(Message::Community)
            }
            Version::V3 => V3Message::decode_from_sequence(&mut seq).map(Message::V3),
        }
    }
}

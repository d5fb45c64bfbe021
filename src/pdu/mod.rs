//! SNMP Protocol Data Units (PDUs).
//!
//! Only the read side of RFC 3416 is modelled: GET, GETNEXT, GETBULK and the
//! Response/Report PDUs an agent answers with.

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{ErrorStatus, Result};
use crate::oid::Oid;
use crate::varbind::{VarBind, decode_varbind_list, encode_varbind_list};

/// PDU type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PduType {
    GetRequest = tag::pdu::GET_REQUEST,
    GetNextRequest = tag::pdu::GET_NEXT_REQUEST,
    Response = tag::pdu::RESPONSE,
    GetBulkRequest = tag::pdu::GET_BULK_REQUEST,
    Report = tag::pdu::REPORT,
}

impl PduType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            tag::pdu::GET_REQUEST => Some(Self::GetRequest),
            tag::pdu::GET_NEXT_REQUEST => Some(Self::GetNextRequest),
            tag::pdu::RESPONSE => Some(Self::Response),
            tag::pdu::GET_BULK_REQUEST => Some(Self::GetBulkRequest),
            tag::pdu::REPORT => Some(Self::Report),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for PduType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::GetRequest => "GetRequest",
            Self::GetNextRequest => "GetNextRequest",
            Self::Response => "Response",
            Self::GetBulkRequest => "GetBulkRequest",
            Self::Report => "Report",
        };
        f.write_str(name)
    }
}

/// Request/response PDU.
#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
    pub pdu_type: PduType,
    /// Correlates a response with its request.
    pub request_id: i32,
    /// Error status for responses; non-repeaters for GETBULK.
    pub error_status: i32,
    /// 1-based index of the failing varbind; max-repetitions for GETBULK.
    pub error_index: i32,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    fn with_nulls(pdu_type: PduType, request_id: i32, oids: &[Oid]) -> Self {
        Self {
            pdu_type,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: oids.iter().cloned().map(VarBind::null).collect(),
        }
    }

    pub fn get_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::with_nulls(PduType::GetRequest, request_id, oids)
    }

    pub fn get_next_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::with_nulls(PduType::GetNextRequest, request_id, oids)
    }

    /// GETBULK request. `non_repeaters` and `max_repetitions` travel in the
    /// error-status and error-index slots.
    pub fn get_bulk(request_id: i32, non_repeaters: i32, max_repetitions: i32, oids: &[Oid]) -> Self {
        Self {
            error_status: non_repeaters,
            error_index: max_repetitions,
            ..Self::with_nulls(PduType::GetBulkRequest, request_id, oids)
        }
    }

    /// Response PDU carrying `varbinds`.
    pub fn response(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type: PduType::Response,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(self.pdu_type.tag(), |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_integer(self.error_index);
            buf.push_integer(self.error_status);
            buf.push_integer(self.request_id);
        });
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let tag = decoder.read_tag()?;
        let Some(pdu_type) = PduType::from_tag(tag) else {
            tracing::debug!(target: "snmp_cache::ber", { snmp.pdu_tag = tag }, "unsupported PDU type");
            return Err(decoder.malformed("unsupported PDU type"));
        };

        let len = decoder.read_length()?;
        let mut body = decoder.sub_decoder(len)?;

        let request_id = body.read_integer()?;
        let error_status = body.read_integer()?;
        let error_index = body.read_integer()?;
        let varbinds = decode_varbind_list(&mut body)?;

        Ok(Pdu {
            pdu_type,
            request_id,
            error_status,
            error_index,
            varbinds,
        })
    }

    pub fn is_error(&self) -> bool {
        self.error_status != 0
    }

    pub fn error_status_enum(&self) -> ErrorStatus {
        ErrorStatus::from_i32(self.error_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::value::Value;

    #[test]
    fn get_request_wire_bytes() {
        let pdu = Pdu::get_request(1, &[oid!(1, 3, 6, 1)]);
        let mut buf = EncodeBuf::new();
        pdu.encode(&mut buf);
        assert_eq!(
            &buf.finish()[..],
            &[
                0xA0, 0x14, // GetRequest
                0x02, 0x01, 0x01, // request-id
                0x02, 0x01, 0x00, // error-status
                0x02, 0x01, 0x00, // error-index
                0x30, 0x09, 0x30, 0x07, 0x06, 0x03, 0x2B, 0x06, 0x01, 0x05, 0x00,
            ]
        );
    }

    #[test]
    fn bulk_fields_live_in_error_slots() {
        let pdu = Pdu::get_bulk(9, 0, 25, &[oid!(1, 3, 6, 1, 2, 1, 2, 2)]);
        assert_eq!(pdu.pdu_type, PduType::GetBulkRequest);
        assert_eq!(pdu.error_status, 0);
        assert_eq!(pdu.error_index, 25);

        let mut buf = EncodeBuf::new();
        pdu.encode(&mut buf);
        let decoded = Pdu::decode(&mut Decoder::new(buf.finish())).unwrap();
        assert_eq!(decoded, pdu);
    }

    #[test]
    fn response_error_status() {
        let mut pdu = Pdu::response(4, vec![VarBind::new(oid!(1, 3), Value::Null)]);
        assert!(!pdu.is_error());
        pdu.error_status = 2;
        assert_eq!(pdu.error_status_enum(), ErrorStatus::NoSuchName);
    }

    #[test]
    fn unsupported_pdu_tag() {
        // SetRequest
        let bytes = [0xA3, 0x0B, 0x02, 0x01, 0x01, 0x02, 0x01, 0x00, 0x02, 0x01, 0x00, 0x30, 0x00];
        assert!(Pdu::decode(&mut Decoder::from_slice(&bytes)).is_err());
    }
}

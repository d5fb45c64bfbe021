//! Transport layer abstraction.
//!
//! [`UdpTransport`] talks to a real agent. With the `testing` feature,
//! `MockTransport` answers from queued responses or an in-memory OID tree.

#[cfg(any(test, feature = "testing"))]
mod mock;
mod udp;

#[cfg(any(test, feature = "testing"))]
pub use mock::*;
pub use udp::*;

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;

use crate::ber::decode_length;
use crate::ber::tag;
use crate::error::Result;

/// Client-side transport.
///
/// Walk streams own a clone of the client, and with it the transport, so
/// implementations keep their state behind an `Arc`.
pub trait Transport: Send + Sync + Clone {
    /// Send request data to the target.
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Wait up to `timeout` for the response to `request_id`.
    ///
    /// Returns the response bytes and the address they came from.
    fn recv(
        &self,
        request_id: i32,
        timeout: Duration,
    ) -> impl Future<Output = Result<(Bytes, SocketAddr)>> + Send;

    fn peer_addr(&self) -> SocketAddr;

    fn local_addr(&self) -> SocketAddr;
}

/// Request id of a v1/v2c message, or msgID of a v3 message.
///
/// Reads just enough BER to correlate a datagram without decoding it.
pub(crate) fn extract_request_id(data: &[u8]) -> Option<i32> {
    let mut pos = header(data, 0, tag::universal::SEQUENCE)?.0;

    let (content, len) = header(data, pos, tag::universal::INTEGER)?;
    let version = decode_signed(data.get(content..content + len)?)?;
    pos = content + len;

    match (version, *data.get(pos)?) {
        (3, tag::universal::SEQUENCE) => {
            // msgGlobalData { msgID, ... }
            let (inner, _) = header(data, pos, tag::universal::SEQUENCE)?;
            let (content, len) = header(data, inner, tag::universal::INTEGER)?;
            decode_signed(data.get(content..content + len)?)
        }
        (_, tag::universal::OCTET_STRING) => {
            let (content, len) = header(data, pos, tag::universal::OCTET_STRING)?;
            pos = content + len;
            if !(tag::pdu::GET_REQUEST..=tag::pdu::REPORT).contains(data.get(pos)?) {
                return None;
            }
            let (inner, _) = header(data, pos, *data.get(pos)?)?;
            let (content, len) = header(data, inner, tag::universal::INTEGER)?;
            decode_signed(data.get(content..content + len)?)
        }
        _ => None,
    }
}

/// Check the tag at `pos` and return `(content_offset, content_len)`.
fn header(data: &[u8], pos: usize, expected: u8) -> Option<(usize, usize)> {
    if *data.get(pos)? != expected {
        return None;
    }
    let (len, consumed) = decode_length(data.get(pos + 1..)?, pos + 1, None).ok()?;
    Some((pos + 1 + consumed, len))
}

fn decode_signed(bytes: &[u8]) -> Option<i32> {
    if bytes.is_empty() || bytes.len() > 4 {
        return None;
    }
    let init: i32 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
    Some(bytes.iter().fold(init, |acc, &b| (acc << 8) | b as i32))
}

#[cfg(test)]
mod extract_tests {
    use super::*;

    #[test]
    fn v2c_request_id() {
        let response = [
            0x30, 0x1c, // SEQUENCE
            0x02, 0x01, 0x01, // v2c
            0x04, 0x06, 0x70, 0x75, 0x62, 0x6c, 0x69, 0x63, // "public"
            0xa2, 0x0f, // Response PDU
            0x02, 0x02, 0x30, 0x39, // 12345
            0x02, 0x01, 0x00, 0x02, 0x01, 0x00, // error-status, error-index
            0x30, 0x03, 0x30, 0x01, 0x00,
        ];
        assert_eq!(extract_request_id(&response), Some(12345));
    }

    #[test]
    fn v3_msg_id() {
        let v3_response = [
            0x30, 0x14, // SEQUENCE
            0x02, 0x01, 0x03, // version 3
            0x30, 0x0f, // msgGlobalData
            0x02, 0x02, 0x30, 0x39, // msgID 12345
            0x02, 0x03, 0x00, 0xff, 0xe3, // msgMaxSize
            0x04, 0x01, 0x04, // msgFlags
            0x02, 0x01, 0x03, // USM
        ];
        assert_eq!(extract_request_id(&v3_response), Some(12345));
    }

    #[test]
    fn negative_request_id() {
        let response = [
            0x30, 0x19, 0x02, 0x01, 0x01, 0x04, 0x06, 0x70, 0x75, 0x62, 0x6c, 0x69, 0x63, 0xa2,
            0x0c, 0x02, 0x01, 0xff, // -1
            0x02, 0x01, 0x00, 0x02, 0x01, 0x00, 0x30, 0x00,
        ];
        assert_eq!(extract_request_id(&response), Some(-1));
    }

    #[test]
    fn malformed() {
        assert_eq!(extract_request_id(&[]), None);
        assert_eq!(extract_request_id(&[0x02, 0x01, 0x00]), None);
        assert_eq!(extract_request_id(&[0x30, 0x10]), None);
        // community followed by a non-PDU tag
        assert_eq!(
            extract_request_id(&[0x30, 0x08, 0x02, 0x01, 0x01, 0x04, 0x00, 0x02, 0x01, 0x00]),
            None
        );
    }
}

//! BER length encoding and decoding (X.690 Section 8.1.3).
//!
//! Short form for lengths up to 127, long form up to four octets. The
//! indefinite form (0x80) is rejected, as net-snmp does.

use std::net::SocketAddr;

use crate::error::{Error, Result, UNKNOWN_TARGET};

/// Largest content length accepted when decoding (2 MiB).
pub const MAX_LENGTH: usize = 0x200000;

/// Encode a length. The returned bytes are in reverse order, ready to be
/// prepended to an [`EncodeBuf`](super::EncodeBuf).
pub fn encode_length(len: usize) -> ([u8; 5], usize) {
    let mut buf = [0u8; 5];

    if len <= 127 {
        buf[0] = len as u8;
        return (buf, 1);
    }

    let mut count = 0;
    let mut rest = len;
    while rest > 0 && count < 4 {
        buf[count] = rest as u8;
        rest >>= 8;
        count += 1;
    }
    buf[count] = 0x80 | count as u8;
    (buf, count + 1)
}

/// Decode a length, returning `(length, bytes_consumed)`.
///
/// `offset` and `target` are only used for the diagnostic on failure.
pub fn decode_length(
    data: &[u8],
    offset: usize,
    target: Option<SocketAddr>,
) -> Result<(usize, usize)> {
    let fail = |reason: &'static str| {
        tracing::debug!(target: "snmp_cache::ber", { snmp.offset = offset, snmp.decode_error = reason }, "invalid length");
        Error::MalformedResponse {
            target: target.unwrap_or(UNKNOWN_TARGET),
        }
        .boxed()
    };

    let Some(&first) = data.first() else {
        return Err(fail("truncated"));
    };

    if first == 0x80 {
        return Err(fail("indefinite length"));
    }
    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    let num_octets = (first & 0x7F) as usize;
    if num_octets == 0 || num_octets > 4 {
        return Err(fail("unsupported length octet count"));
    }
    let Some(octets) = data.get(1..1 + num_octets) else {
        return Err(fail("truncated"));
    };

    let len = octets
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize);
    if len > MAX_LENGTH {
        return Err(fail("length exceeds maximum"));
    }

    Ok((len, 1 + num_octets))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_and_long_forms() {
        assert_eq!(decode_length(&[0], 0, None).unwrap(), (0, 1));
        assert_eq!(decode_length(&[127], 0, None).unwrap(), (127, 1));
        assert_eq!(decode_length(&[0x81, 128], 0, None).unwrap(), (128, 2));
        assert_eq!(decode_length(&[0x82, 0x01, 0x00], 0, None).unwrap(), (256, 3));
    }

    #[test]
    fn non_minimal_lengths_accepted() {
        assert_eq!(decode_length(&[0x82, 0x00, 0x05], 0, None).unwrap(), (5, 3));
        assert_eq!(decode_length(&[0x81, 0x01], 0, None).unwrap(), (1, 2));
    }

    #[test]
    fn rejected_lengths() {
        assert!(decode_length(&[], 0, None).is_err());
        assert!(decode_length(&[0x80], 0, None).is_err());
        assert!(decode_length(&[0x85, 0, 0, 0, 0, 1], 0, None).is_err());
        assert!(decode_length(&[0x82, 0x01], 0, None).is_err());
        // one past the 2 MiB ceiling
        assert!(decode_length(&[0x83, 0x20, 0x00, 0x01], 0, None).is_err());
        assert_eq!(
            decode_length(&[0x83, 0x20, 0x00, 0x00], 0, None).unwrap(),
            (MAX_LENGTH, 4)
        );
    }

    #[test]
    fn encode_is_reversed() {
        let (buf, n) = encode_length(5);
        assert_eq!(&buf[..n], &[5]);
        let (buf, n) = encode_length(128);
        assert_eq!(&buf[..n], &[128, 0x81]);
        let (buf, n) = encode_length(256);
        assert_eq!(&buf[..n], &[0, 1, 0x82]);
    }
}

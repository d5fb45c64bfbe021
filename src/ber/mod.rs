//! BER (Basic Encoding Rules) codec for the subset of ASN.1 that SNMP uses.
//!
//! Encoding writes backwards into [`EncodeBuf`] so that every length is known
//! when its header is emitted. Decoding is zero-copy over [`bytes::Bytes`].

mod decode;
mod encode;
mod length;
pub mod tag;

pub use decode::Decoder;
pub use encode::EncodeBuf;
pub use length::{MAX_LENGTH, decode_length, encode_length};

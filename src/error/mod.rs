//! Error types for snmp-cache.
//!
//! This module provides:
//!
//! - [`Error`] - The main error type covering transport, protocol, MIB and cache failures
//! - [`ErrorStatus`] - SNMP protocol errors returned by agents (RFC 3416)
//! - [`WalkAbortReason`] - Reasons a walk operation was aborted
//! - [`CryptoErrorKind`] - Why SNMPv3 privacy processing failed
//!
//! # Error Handling
//!
//! Errors are boxed: `Result<T> = Result<T, Box<Error>>`.
//!
//! ```rust
//! use snmp_cache::{Error, Result};
//!
//! fn handle_error(result: Result<()>) {
//!     match result {
//!         Ok(()) => println!("Success"),
//!         Err(e) => match &*e {
//!             Error::Timeout { target, retries, .. } => {
//!                 println!("{} unreachable after {} retries", target, retries);
//!             }
//!             Error::MibNotLoaded { mib, .. } => {
//!                 println!("load {} first", mib);
//!             }
//!             _ => println!("Error: {}", e),
//!         }
//!     }
//! }
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::oid::Oid;

/// Placeholder target address used when no target is known.
///
/// Used in error contexts where the target address cannot be determined,
/// e.g. decoding a buffer outside of a client exchange.
pub(crate) const UNKNOWN_TARGET: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)), 0);

// Decode failures log their detail and collapse to MalformedResponse:
//
// tracing::debug!(
//     target: "snmp_cache::ber",
//     { snmp.offset = 42, snmp.decode_error = "ZeroLengthInteger" },
//     "decode error details here"
// );
// return Err(Error::MalformedResponse { target }.boxed());

/// Result type alias using the library's boxed Error type.
pub type Result<T> = std::result::Result<T, Box<Error>>;

/// Reason a walk operation was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkAbortReason {
    /// Agent returned an OID that is not greater than the previous OID.
    NonIncreasing,
    /// Agent returned an OID that was already seen (cycle detected).
    Cycle,
}

impl std::fmt::Display for WalkAbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonIncreasing => write!(f, "non-increasing OID"),
            Self::Cycle => write!(f, "cycle detected"),
        }
    }
}

/// Why an encryption or decryption step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoErrorKind {
    /// Message claims privacy but no privacy key is configured.
    NoPrivKey,
    /// Key material shorter than the cipher needs.
    InvalidKeyLength,
    /// msgPrivacyParameters was not 8 bytes.
    InvalidPrivParamsLength { actual: usize },
    /// DES ciphertext not a multiple of the block size.
    InvalidCiphertextLength { length: usize },
    CipherError,
}

impl std::fmt::Display for CryptoErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPrivKey => write!(f, "no privacy key available"),
            Self::InvalidKeyLength => write!(f, "invalid key length"),
            Self::InvalidPrivParamsLength { actual } => {
                write!(f, "privacy parameters must be 8 bytes, got {}", actual)
            }
            Self::InvalidCiphertextLength { length } => {
                write!(f, "ciphertext length {} is not a multiple of 8", length)
            }
            Self::CipherError => write!(f, "cipher error"),
        }
    }
}

/// The main error type for all snmp-cache operations.
///
/// Transport and protocol variants carry the target address. MIB and cache
/// variants carry the names the caller asked for so the message can be shown
/// as-is.
///
/// ```
/// use snmp_cache::Error;
///
/// fn is_retriable(error: &Error) -> bool {
///     matches!(error, Error::Timeout { .. } | Error::Network { .. })
/// }
/// ```
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Network failure (connection refused, unreachable, etc.)
    #[error("network error communicating with {target}: {source}")]
    Network {
        target: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Request timed out after retries.
    #[error("timeout after {elapsed:?} waiting for {target} ({retries} retries)")]
    Timeout {
        target: SocketAddr,
        elapsed: Duration,
        retries: u32,
    },

    /// SNMP protocol error from agent.
    #[error("SNMP error from {target}: {status} at index {index}")]
    Snmp {
        target: SocketAddr,
        status: ErrorStatus,
        index: u32,
        oid: Option<Oid>,
    },

    /// Authentication failed (bad digest or unknown user report).
    #[error("authentication failed for {target}")]
    Auth { target: SocketAddr },

    /// SNMPv3 encryption or decryption failed.
    #[error("privacy failure for {}: {kind}", target.map_or_else(|| "request".to_string(), |t| t.to_string()))]
    Crypto {
        target: Option<SocketAddr>,
        kind: CryptoErrorKind,
    },

    /// Malformed response from agent.
    #[error("malformed response from {target}")]
    MalformedResponse { target: SocketAddr },

    /// Walk aborted due to agent misbehavior.
    #[error("walk aborted for {target}: {reason}")]
    WalkAborted {
        target: SocketAddr,
        reason: WalkAbortReason,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(Box<str>),

    /// Invalid OID format.
    #[error("invalid OID: {0}")]
    InvalidOid(Box<str>),

    /// Invalid SNMP credential.
    #[error("{0}")]
    Credential(Box<str>),

    /// Requested MIB has not been loaded.
    #[error("MIB {mib} not loaded.  Loaded MIB's: {loaded}")]
    MibNotLoaded { mib: Box<str>, loaded: Box<str> },

    /// Requested object is not defined in the MIB.
    #[error("Object {object} not in MIB {mib}.")]
    ObjectNotInMib { mib: Box<str>, object: Box<str> },

    /// Row grouping lost or invented rows.
    #[error("Parsed rows does not match returned rows! {parsed} / {returned}")]
    RowCountMismatch { parsed: usize, returned: usize },

    /// MIB file could not be read.
    #[error("could not read MIB file {}: {source}", path.display())]
    MibIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// MIB file is not valid JSON.
    #[error("could not parse MIB file {}: {source}", path.display())]
    MibParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Box this error (convenience for constructing boxed errors).
    pub fn boxed(self) -> Box<Self> {
        Box::new(self)
    }

    pub(crate) fn crypto(target: Option<SocketAddr>, kind: CryptoErrorKind) -> Box<Self> {
        Self::Crypto { target, kind }.boxed()
    }

    /// The target address for transport and protocol errors.
    pub fn target(&self) -> Option<SocketAddr> {
        match self {
            Self::Network { target, .. }
            | Self::Timeout { target, .. }
            | Self::Snmp { target, .. }
            | Self::Auth { target }
            | Self::MalformedResponse { target }
            | Self::WalkAborted { target, .. } => Some(*target),
            Self::Crypto { target, .. } => *target,
            _ => None,
        }
    }
}

/// SNMP protocol error status codes (RFC 3416).
///
/// ```
/// use snmp_cache::ErrorStatus;
///
/// let status = ErrorStatus::from_i32(2);
/// assert_eq!(status, ErrorStatus::NoSuchName);
/// assert_eq!(status.as_i32(), 2);
/// assert_eq!(status.to_string(), "noSuchName");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorStatus {
    NoError,
    TooBig,
    /// SNMPv1 only; v2c+ agents answer with exception values instead.
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    AuthorizationError,
    NotWritable,
    InconsistentName,
    /// Unknown or future error status code.
    Unknown(i32),
}

impl ErrorStatus {
    /// Create from raw status code.
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::TooBig,
            2 => Self::NoSuchName,
            3 => Self::BadValue,
            4 => Self::ReadOnly,
            5 => Self::GenErr,
            6 => Self::NoAccess,
            7 => Self::WrongType,
            8 => Self::WrongLength,
            9 => Self::WrongEncoding,
            10 => Self::WrongValue,
            11 => Self::NoCreation,
            12 => Self::InconsistentValue,
            13 => Self::ResourceUnavailable,
            14 => Self::CommitFailed,
            15 => Self::UndoFailed,
            16 => Self::AuthorizationError,
            17 => Self::NotWritable,
            18 => Self::InconsistentName,
            other => {
                tracing::warn!(target: "snmp_cache::error", { snmp.error_status = other }, "unknown SNMP error status");
                Self::Unknown(other)
            }
        }
    }

    /// Convert to raw status code.
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::NoError => 0,
            Self::TooBig => 1,
            Self::NoSuchName => 2,
            Self::BadValue => 3,
            Self::ReadOnly => 4,
            Self::GenErr => 5,
            Self::NoAccess => 6,
            Self::WrongType => 7,
            Self::WrongLength => 8,
            Self::WrongEncoding => 9,
            Self::WrongValue => 10,
            Self::NoCreation => 11,
            Self::InconsistentValue => 12,
            Self::ResourceUnavailable => 13,
            Self::CommitFailed => 14,
            Self::UndoFailed => 15,
            Self::AuthorizationError => 16,
            Self::NotWritable => 17,
            Self::InconsistentName => 18,
            Self::Unknown(code) => *code,
        }
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NoError => "noError",
            Self::TooBig => "tooBig",
            Self::NoSuchName => "noSuchName",
            Self::BadValue => "badValue",
            Self::ReadOnly => "readOnly",
            Self::GenErr => "genErr",
            Self::NoAccess => "noAccess",
            Self::WrongType => "wrongType",
            Self::WrongLength => "wrongLength",
            Self::WrongEncoding => "wrongEncoding",
            Self::WrongValue => "wrongValue",
            Self::NoCreation => "noCreation",
            Self::InconsistentValue => "inconsistentValue",
            Self::ResourceUnavailable => "resourceUnavailable",
            Self::CommitFailed => "commitFailed",
            Self::UndoFailed => "undoFailed",
            Self::AuthorizationError => "authorizationError",
            Self::NotWritable => "notWritable",
            Self::InconsistentName => "inconsistentName",
            Self::Unknown(code) => return write!(f, "unknown({})", code),
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_size_budget() {
        // The largest variant is Error::Snmp which contains Option<Oid>.
        assert!(
            std::mem::size_of::<Error>() <= 128,
            "Error size {} exceeds 128-byte budget",
            std::mem::size_of::<Error>()
        );

        assert_eq!(
            std::mem::size_of::<Result<()>>(),
            std::mem::size_of::<*const ()>(),
            "Result<()> should be pointer-sized"
        );
    }

    #[test]
    fn cache_error_messages() {
        let err = Error::MibNotLoaded {
            mib: "IF-MIB".into(),
            loaded: "[SNMPv2-MIB]".into(),
        };
        assert_eq!(
            err.to_string(),
            "MIB IF-MIB not loaded.  Loaded MIB's: [SNMPv2-MIB]"
        );

        let err = Error::ObjectNotInMib {
            mib: "IF-MIB".into(),
            object: "ifFoo".into(),
        };
        assert_eq!(err.to_string(), "Object ifFoo not in MIB IF-MIB.");

        let err = Error::RowCountMismatch {
            parsed: 2,
            returned: 3,
        };
        assert_eq!(
            err.to_string(),
            "Parsed rows does not match returned rows! 2 / 3"
        );
    }

    #[test]
    fn status_roundtrip_and_unknown() {
        for code in 0..=18 {
            assert_eq!(ErrorStatus::from_i32(code).as_i32(), code);
        }
        assert_eq!(ErrorStatus::from_i32(99), ErrorStatus::Unknown(99));
        assert_eq!(ErrorStatus::Unknown(99).to_string(), "unknown(99)");
        assert_eq!(ErrorStatus::AuthorizationError.to_string(), "authorizationError");
    }

    #[test]
    fn target_only_for_transport_errors() {
        let target: SocketAddr = SocketAddr::from(([192, 0, 2, 1], 161));
        assert_eq!(Error::Auth { target }.target(), Some(target));
        assert_eq!(Error::Config("x".into()).target(), None);
    }
}

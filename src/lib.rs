//! # snmp-cache
//!
//! Async SNMP table poller with a per-table cache and JSON MIB resolution.
//!
//! ## Features
//!
//! - SNMPv2c and SNMPv3 USM (MD5/SHA-1 auth, DES/AES-128 privacy)
//! - GET, GETNEXT, GETBULK and subtree walks over UDP, built on Tokio
//! - JSON MIB loading (pysmi format) with cross-MIB textual conventions
//! - Whole-table queries returned as JSON rows keyed by column name
//! - Results cached per table with an age limit
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use snmp_cache::{CacheConfig, SnmpCache};
//! use snmp_cache::credentials::SnmpCredV3;
//!
//! #[tokio::main]
//! async fn main() -> snmp_cache::Result<()> {
//!     let cred = SnmpCredV3::new(Some("monitor"), Some("sha1"), Some("authpass123"), Some("aes"), Some("privpass123"))?;
//!     let cache = SnmpCache::new(
//!         "192.168.1.1",
//!         cred,
//!         CacheConfig::default().with_mib_paths(["./mibs"]),
//!     )
//!     .await?;
//!
//!     let rows = cache.get_table("IF-MIB", "ifEntry", true, 5).await?;
//!     println!("{}", serde_json::to_string_pretty(&rows).unwrap_or_default());
//!     Ok(())
//! }
//! ```
//!
//! ## Plain client
//!
//! ```rust,no_run
//! use snmp_cache::{Auth, Client, oid};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<snmp_cache::Error>> {
//!     let client = Client::builder("192.168.1.1:161", Auth::v2c("public"))
//!         .timeout(Duration::from_secs(5))
//!         .connect()
//!         .await?;
//!
//!     let result = client.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await?;
//!     println!("sysDescr: {}", result.value);
//!     Ok(())
//! }
//! ```

pub mod ber;
pub mod cache;
pub mod client;
pub mod credentials;
pub mod error;
pub mod format;
pub mod message;
pub mod mib;
pub mod oid;
pub mod pdu;
pub mod transport;
pub mod v3;
pub mod value;
pub mod varbind;
pub mod version;

pub(crate) mod util;

#[cfg(feature = "cli")]
pub mod cli;

pub use cache::{CacheConfig, Row, SnmpCache};
pub use client::{
    Auth, BulkWalk, Client, ClientBuilder, ClientConfig, OidOrdering, TableRow, UsmAuth,
    UsmBuilder, V3SecurityConfig, Walk, WalkMode, WalkStream,
};
pub use credentials::{SnmpCred, SnmpCredV2, SnmpCredV3};
pub use error::{CryptoErrorKind, Error, ErrorStatus, Result, WalkAbortReason};
pub use message::SecurityLevel;
pub use mib::MibSet;
pub use oid::Oid;
pub use pdu::{Pdu, PduType};
#[cfg(any(test, feature = "testing"))]
pub use transport::MockTransport;
pub use transport::{Transport, UdpTransport};
pub use v3::{AuthProtocol, ParseProtocolError, PrivProtocol};
pub use value::Value;
pub use varbind::VarBind;
pub use version::Version;

/// Client over a dedicated UDP socket.
pub type UdpClient = Client<UdpTransport>;

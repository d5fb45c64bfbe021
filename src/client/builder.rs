//! [`ClientBuilder`]: one entry point for v2c and v3 clients.

use std::time::Duration;

use bytes::Bytes;

use crate::client::retry::Retry;
use crate::client::walk::{OidOrdering, WalkMode};
use crate::client::{
    Auth, Client, ClientConfig, DEFAULT_MAX_OIDS_PER_REQUEST, DEFAULT_MAX_REPETITIONS,
    DEFAULT_TIMEOUT, V3SecurityConfig,
};
use crate::error::{Error, Result};
use crate::transport::{Transport, UdpTransport};
use crate::util::resolve_target;
use crate::version::Version;

/// Builder for [`Client`].
///
/// ```rust,no_run
/// use snmp_cache::{Auth, Client};
/// use snmp_cache::client::Retry;
/// use std::time::Duration;
///
/// # async fn example() -> snmp_cache::Result<()> {
/// let client = Client::builder("switch1.example:161", Auth::v2c("public"))
///     .timeout(Duration::from_secs(2))
///     .retry(Retry::fixed(2, Duration::from_millis(250)))
///     .connect()
///     .await?;
/// # let _ = client;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    target: String,
    auth: Auth,
    prefer_ipv6: bool,
    timeout: Duration,
    retry: Retry,
    max_oids_per_request: usize,
    max_repetitions: u32,
    walk_mode: WalkMode,
    oid_ordering: OidOrdering,
}

impl ClientBuilder {
    /// `target` is `host:port`; IPv6 literals go in brackets.
    pub fn new(target: impl Into<String>, auth: impl Into<Auth>) -> Self {
        Self {
            target: target.into(),
            auth: auth.into(),
            prefer_ipv6: false,
            timeout: DEFAULT_TIMEOUT,
            retry: Retry::default(),
            max_oids_per_request: DEFAULT_MAX_OIDS_PER_REQUEST,
            max_repetitions: DEFAULT_MAX_REPETITIONS,
            walk_mode: WalkMode::Auto,
            oid_ordering: OidOrdering::Strict,
        }
    }

    /// Prefer an IPv6 address when the name resolves to both families.
    pub fn prefer_ipv6(mut self, v6: bool) -> Self {
        self.prefer_ipv6 = v6;
        self
    }

    /// Per-attempt response timeout (default: 5 s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry(mut self, retry: impl Into<Retry>) -> Self {
        self.retry = retry.into();
        self
    }

    pub fn max_oids_per_request(mut self, max: usize) -> Self {
        self.max_oids_per_request = max;
        self
    }

    pub fn max_repetitions(mut self, max: u32) -> Self {
        self.max_repetitions = max;
        self
    }

    pub fn walk_mode(mut self, mode: WalkMode) -> Self {
        self.walk_mode = mode;
        self
    }

    pub fn oid_ordering(mut self, ordering: OidOrdering) -> Self {
        self.oid_ordering = ordering;
        self
    }

    fn validate(&self) -> Result<()> {
        if let Auth::Usm(usm) = &self.auth {
            if usm.username.is_empty() {
                return Err(Error::Config("USM username is empty".into()).boxed());
            }
            if usm.priv_protocol.is_some() && usm.auth_protocol.is_none() {
                return Err(Error::Config("privacy requires authentication".into()).boxed());
            }
            if usm.auth_protocol.is_some() && usm.auth_password.is_none() {
                return Err(Error::Config("auth protocol requires password".into()).boxed());
            }
            if usm.priv_protocol.is_some() && usm.priv_password.is_none() {
                return Err(Error::Config("priv protocol requires password".into()).boxed());
            }
        }
        if self.max_oids_per_request == 0 {
            return Err(Error::Config("max_oids_per_request must be at least 1".into()).boxed());
        }
        Ok(())
    }

    fn build_config(&self) -> ClientConfig {
        let base = ClientConfig {
            timeout: self.timeout,
            retry: self.retry.clone(),
            max_oids_per_request: self.max_oids_per_request,
            walk_mode: self.walk_mode,
            oid_ordering: self.oid_ordering,
            max_repetitions: self.max_repetitions,
            ..ClientConfig::default()
        };

        match &self.auth {
            Auth::Community { community } => ClientConfig {
                version: Version::V2c,
                community: Bytes::copy_from_slice(community.as_bytes()),
                ..base
            },
            Auth::Usm(usm) => {
                let mut security =
                    V3SecurityConfig::new(Bytes::copy_from_slice(usm.username.as_bytes()));
                if let (Some(protocol), Some(password)) = (usm.auth_protocol, &usm.auth_password) {
                    security = security.auth(protocol, password.as_bytes());
                }
                if let (Some(protocol), Some(password)) = (usm.priv_protocol, &usm.priv_password) {
                    security = security.privacy(protocol, password.as_bytes());
                }
                ClientConfig {
                    version: Version::V3,
                    community: Bytes::new(),
                    v3_security: Some(security),
                    ..base
                }
            }
        }
    }

    /// Build a client over an existing transport.
    pub fn build<T: Transport>(self, transport: T) -> Result<Client<T>> {
        self.validate()?;
        Ok(Client::new(transport, self.build_config()))
    }

    /// Resolve the target and connect a UDP socket to it.
    pub async fn connect(self) -> Result<Client<UdpTransport>> {
        self.validate()?;
        let addr = resolve_target(&self.target, self.prefer_ipv6)
            .await
            .map_err(|e| {
                Error::Config(format!("could not resolve address '{}': {}", self.target, e).into())
                    .boxed()
            })?;
        let transport = UdpTransport::connect(addr).await?;
        Ok(Client::new(transport, self.build_config()))
    }
}

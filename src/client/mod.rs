//! Async SNMP client.
//!
//! [`Client`] is cheap to clone; clones share the transport, the request id
//! counter and (for v3) the discovered engine state.
//!
//! ```rust,no_run
//! use snmp_cache::{Auth, Client, oid};
//!
//! # async fn example() -> snmp_cache::Result<()> {
//! let client = Client::builder("192.0.2.1:161", Auth::v2c("public"))
//!     .connect()
//!     .await?;
//!
//! let descr = client.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await?;
//! println!("{}", descr.value);
//! # Ok(())
//! # }
//! ```

mod auth;
mod builder;
mod retry;
mod table;
mod v3;
mod walk;

pub use auth::{Auth, UsmAuth, UsmBuilder};
pub use builder::ClientBuilder;
pub use retry::{Backoff, Retry, RetryBuilder};
pub use table::TableRow;
pub use v3::V3SecurityConfig;
pub use walk::{BulkWalk, OidOrdering, Walk, WalkMode, WalkStream};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;
use tracing::{Span, instrument};

use crate::error::{Error, Result};
use crate::message::{CommunityMessage, Message};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::transport::{Transport, UdpTransport};
use crate::v3::{EngineState, SaltCounter};
use crate::varbind::VarBind;
use crate::version::Version;

use v3::V3DerivedKeys;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_OIDS_PER_REQUEST: usize = 10;
pub const DEFAULT_MAX_REPETITIONS: u32 = 25;

/// SNMP client.
///
/// Generic over the transport so tests can run against `MockTransport`
/// (`testing` feature).
pub struct Client<T: Transport = UdpTransport> {
    inner: Arc<ClientInner<T>>,
}

impl<T: Transport> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ClientInner<T: Transport> {
    transport: T,
    config: ClientConfig,
    request_id: AtomicI32,
    engine_state: RwLock<Option<EngineState>>,
    derived_keys: RwLock<Option<V3DerivedKeys>>,
    salt_counter: SaltCounter,
}

/// Client configuration.
///
/// Usually produced by [`ClientBuilder`]; construct it directly together
/// with [`Client::new`] to plug in a custom transport.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Default: V2c.
    pub version: Version,
    /// Default: `public`.
    pub community: Bytes,
    /// Per-attempt response timeout (default: 5 s).
    pub timeout: Duration,
    /// Default: 3 retries, no delay.
    pub retry: Retry,
    /// GET requests with more OIDs are split into batches (default: 10).
    pub max_oids_per_request: usize,
    /// Present for v3 clients.
    pub v3_security: Option<V3SecurityConfig>,
    /// Default: Auto.
    pub walk_mode: WalkMode,
    /// Default: Strict.
    pub oid_ordering: OidOrdering,
    /// GETBULK max-repetitions used by walks (default: 25).
    pub max_repetitions: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: Version::V2c,
            community: Bytes::from_static(b"public"),
            timeout: DEFAULT_TIMEOUT,
            retry: Retry::default(),
            max_oids_per_request: DEFAULT_MAX_OIDS_PER_REQUEST,
            v3_security: None,
            walk_mode: WalkMode::Auto,
            oid_ordering: OidOrdering::Strict,
            max_repetitions: DEFAULT_MAX_REPETITIONS,
        }
    }
}

impl Client<UdpTransport> {
    /// Start building a UDP client for `target` (`host:port`).
    pub fn builder(target: impl Into<String>, auth: impl Into<Auth>) -> ClientBuilder {
        ClientBuilder::new(target, auth)
    }
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                config,
                request_id: AtomicI32::new(initial_request_id()),
                engine_state: RwLock::new(None),
                derived_keys: RwLock::new(None),
                salt_counter: SaltCounter::new(),
            }),
        }
    }

    /// The agent address requests go to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.transport.peer_addr()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Positive, never zero; wraps back to 1.
    fn next_request_id(&self) -> i32 {
        let id = self
            .inner
            .request_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| {
                Some(if id >= i32::MAX - 1 { 1 } else { id + 1 })
            })
            .unwrap_or(1);
        id.max(1)
    }

    fn is_v3(&self) -> bool {
        self.inner.config.version == Version::V3 && self.inner.config.v3_security.is_some()
    }

    /// Wait until `accept` produces a value or the per-attempt timeout runs out.
    ///
    /// `accept` returns `Ok(None)` for datagrams that belong to some other
    /// request; those are dropped and the wait continues.
    async fn recv_until<R>(
        &self,
        request_id: i32,
        mut accept: impl FnMut(Bytes) -> Result<Option<R>> + Send,
    ) -> Result<R> {
        let timeout = self.inner.config.timeout;
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout {
                    target: self.peer_addr(),
                    elapsed: timeout,
                    retries: 0,
                }
                .boxed());
            }

            let (data, _source) = self.inner.transport.recv(request_id, remaining).await?;
            tracing::trace!(target: "snmp_cache::client", { snmp.bytes = data.len() }, "received response");

            if let Some(response) = accept(data)? {
                return Ok(response);
            }
        }
    }

    async fn backoff(&self, attempt: u32) {
        let delay = self.inner.config.retry.compute_delay(attempt);
        if !delay.is_zero() {
            tracing::debug!(target: "snmp_cache::client", { delay_ms = delay.as_millis() as u64 }, "backing off");
            tokio::time::sleep(delay).await;
        }
    }

    /// Decode a community response, dropping it if it answers another request.
    fn accept_community(&self, data: Bytes, request_id: i32) -> Result<Option<Pdu>> {
        let target = self.peer_addr();
        let pdu = match Message::decode_from(data, target)? {
            Message::Community(msg) => msg.pdu,
            Message::V3(_) => {
                tracing::debug!(target: "snmp_cache::client", { snmp.target = %target }, "v3 message in reply to community request");
                return Err(Error::MalformedResponse { target }.boxed());
            }
        };

        if pdu.request_id != request_id {
            tracing::debug!(
                target: "snmp_cache::client",
                { snmp.target = %target, snmp.request_id = request_id, snmp.received_id = pdu.request_id },
                "discarding response with mismatched request id"
            );
            return Ok(None);
        }
        if pdu.pdu_type != PduType::Response {
            tracing::debug!(target: "snmp_cache::client", { snmp.target = %target, snmp.pdu_type = %pdu.pdu_type }, "unexpected PDU type in response");
            return Err(Error::MalformedResponse { target }.boxed());
        }
        Ok(Some(pdu))
    }

    /// Send a community request, retrying on timeout.
    #[instrument(
        level = "debug",
        skip(self, pdu),
        fields(
            snmp.target = %self.peer_addr(),
            snmp.request_id = pdu.request_id,
            snmp.attempt = tracing::field::Empty,
            snmp.elapsed_ms = tracing::field::Empty,
        )
    )]
    async fn send_and_recv(&self, pdu: Pdu) -> Result<Pdu> {
        let start = Instant::now();
        let request_id = pdu.request_id;
        let pdu_type = pdu.pdu_type;
        let data = CommunityMessage {
            version: self.inner.config.version,
            community: self.inner.config.community.clone(),
            pdu,
        }
        .encode();
        let max_attempts = self.inner.config.retry.max_attempts;

        for attempt in 0..=max_attempts {
            Span::current().record("snmp.attempt", attempt);
            if attempt > 0 {
                tracing::debug!(target: "snmp_cache::client", "retrying request");
            }

            tracing::debug!(target: "snmp_cache::client", { snmp.pdu_type = %pdu_type, snmp.bytes = data.len() }, "sending {} request", pdu_type);
            self.inner.transport.send(&data).await?;

            match self
                .recv_until(request_id, |bytes| self.accept_community(bytes, request_id))
                .await
            {
                Ok(response) => {
                    Span::current().record("snmp.elapsed_ms", start.elapsed().as_millis() as u64);
                    tracing::debug!(
                        target: "snmp_cache::client",
                        { snmp.varbind_count = response.varbinds.len(), snmp.error_status = response.error_status },
                        "received response"
                    );
                    return self.check_error_status(response);
                }
                Err(e) if matches!(*e, Error::Timeout { .. }) => {
                    if attempt < max_attempts {
                        self.backoff(attempt).await;
                    }
                }
                Err(e) => {
                    Span::current().record("snmp.elapsed_ms", start.elapsed().as_millis() as u64);
                    return Err(e);
                }
            }
        }

        Span::current().record("snmp.elapsed_ms", start.elapsed().as_millis() as u64);
        Err(Error::Timeout {
            target: self.peer_addr(),
            elapsed: start.elapsed(),
            retries: max_attempts,
        }
        .boxed())
    }

    /// Map an agent error status to [`Error::Snmp`].
    ///
    /// error-index is 1-based; 0 means the error applies to the whole PDU.
    fn check_error_status(&self, response: Pdu) -> Result<Pdu> {
        if !response.is_error() {
            return Ok(response);
        }
        let oid = usize::try_from(response.error_index)
            .ok()
            .and_then(|idx| idx.checked_sub(1))
            .and_then(|idx| response.varbinds.get(idx))
            .map(|vb| vb.oid.clone());

        Err(Error::Snmp {
            target: self.peer_addr(),
            status: response.error_status_enum(),
            index: u32::try_from(response.error_index).unwrap_or(0),
            oid,
        }
        .boxed())
    }

    async fn send_request(&self, pdu: Pdu) -> Result<Pdu> {
        if self.is_v3() {
            self.send_v3_and_recv(pdu).await
        } else {
            self.send_and_recv(pdu).await
        }
    }

    fn empty_response(&self, what: &str) -> Box<Error> {
        tracing::debug!(target: "snmp_cache::client", { snmp.target = %self.peer_addr() }, "empty {} response", what);
        Error::MalformedResponse {
            target: self.peer_addr(),
        }
        .boxed()
    }

    /// GET a single OID.
    #[instrument(skip(self), err, fields(snmp.target = %self.peer_addr(), snmp.oid = %oid))]
    pub async fn get(&self, oid: &Oid) -> Result<VarBind> {
        let pdu = Pdu::get_request(self.next_request_id(), std::slice::from_ref(oid));
        let response = self.send_request(pdu).await?;
        response
            .varbinds
            .into_iter()
            .next()
            .ok_or_else(|| self.empty_response("GET"))
    }

    /// GET several OIDs, batching by `max_oids_per_request`.
    ///
    /// Results come back in input order.
    #[instrument(skip(self, oids), err, fields(snmp.target = %self.peer_addr(), snmp.oid_count = oids.len()))]
    pub async fn get_many(&self, oids: &[Oid]) -> Result<Vec<VarBind>> {
        if oids.is_empty() {
            return Ok(Vec::new());
        }

        let max_per_request = self.inner.config.max_oids_per_request.max(1);
        if oids.len() <= max_per_request {
            let pdu = Pdu::get_request(self.next_request_id(), oids);
            return Ok(self.send_request(pdu).await?.varbinds);
        }

        let num_batches = oids.len().div_ceil(max_per_request);
        tracing::debug!(
            target: "snmp_cache::client",
            { snmp.oid_count = oids.len(), snmp.max_per_request = max_per_request, snmp.batch_count = num_batches },
            "splitting GET request into batches"
        );

        let mut all_results = Vec::with_capacity(oids.len());
        for (batch_idx, chunk) in oids.chunks(max_per_request).enumerate() {
            tracing::debug!(target: "snmp_cache::client", { snmp.batch = batch_idx + 1, snmp.batch_total = num_batches }, "sending GET batch");
            let pdu = Pdu::get_request(self.next_request_id(), chunk);
            all_results.extend(self.send_request(pdu).await?.varbinds);
        }
        Ok(all_results)
    }

    /// GETNEXT for a single OID.
    #[instrument(skip(self), err, fields(snmp.target = %self.peer_addr(), snmp.oid = %oid))]
    pub async fn get_next(&self, oid: &Oid) -> Result<VarBind> {
        let pdu = Pdu::get_next_request(self.next_request_id(), std::slice::from_ref(oid));
        let response = self.send_request(pdu).await?;
        response
            .varbinds
            .into_iter()
            .next()
            .ok_or_else(|| self.empty_response("GETNEXT"))
    }

    /// GETBULK request.
    ///
    /// The first `non_repeaters` OIDs get one successor each; the rest get
    /// up to `max_repetitions`.
    #[instrument(skip(self, oids), err, fields(
        snmp.target = %self.peer_addr(),
        snmp.oid_count = oids.len(),
        snmp.non_repeaters = non_repeaters,
        snmp.max_repetitions = max_repetitions
    ))]
    pub async fn get_bulk(
        &self,
        oids: &[Oid],
        non_repeaters: i32,
        max_repetitions: i32,
    ) -> Result<Vec<VarBind>> {
        let pdu = Pdu::get_bulk(self.next_request_id(), non_repeaters, max_repetitions, oids);
        Ok(self.send_request(pdu).await?.varbinds)
    }

    /// Walk a subtree with GETNEXT.
    pub fn walk(&self, oid: Oid) -> Walk<T>
    where
        T: 'static,
    {
        Walk::new(self.clone(), oid, self.inner.config.oid_ordering)
    }

    /// Walk a subtree with GETBULK, `max_repetitions` varbinds per request.
    pub fn bulk_walk(&self, oid: Oid, max_repetitions: i32) -> BulkWalk<T>
    where
        T: 'static,
    {
        BulkWalk::new(
            self.clone(),
            oid,
            max_repetitions,
            self.inner.config.oid_ordering,
        )
    }

    /// Walk a subtree, choosing GETNEXT or GETBULK from the configured
    /// [`WalkMode`] and version.
    pub fn walk_auto(&self, oid: Oid) -> Result<WalkStream<T>>
    where
        T: 'static,
    {
        let config = &self.inner.config;
        WalkStream::new(
            self.clone(),
            oid,
            config.version,
            config.walk_mode,
            config.oid_ordering,
            i32::try_from(config.max_repetitions).unwrap_or(i32::MAX),
        )
    }
}

/// Random positive start so ids from a restarted process do not collide
/// with late answers to the previous one.
fn initial_request_id() -> i32 {
    let mut buf = [0u8; 4];
    match getrandom::fill(&mut buf) {
        Ok(()) => (i32::from_le_bytes(buf) & 0x3fff_ffff).max(1),
        Err(_) => 1,
    }
}

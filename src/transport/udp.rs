//! UDP transport.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::time::{Instant, timeout_at};

use super::{Transport, extract_request_id};
use crate::error::{Error, Result};
use crate::util::bind_ephemeral_udp_socket;

/// Largest datagram we accept.
const MAX_DATAGRAM: usize = 65535;

/// UDP transport owning a socket connected to one target.
#[derive(Clone)]
pub struct UdpTransport {
    inner: Arc<UdpTransportInner>,
}

struct UdpTransportInner {
    socket: UdpSocket,
    target: SocketAddr,
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind an ephemeral socket in the target's family and connect it.
    pub async fn connect(target: SocketAddr) -> Result<Self> {
        tracing::debug!(target: "snmp_cache::transport", { snmp.target = %target }, "connecting UDP transport");

        let network = |source| Error::Network { target, source }.boxed();

        let socket = bind_ephemeral_udp_socket(target).map_err(network)?;
        socket.connect(target).await.map_err(network)?;
        let local_addr = socket.local_addr().map_err(network)?;

        tracing::debug!(
            target: "snmp_cache::transport",
            { snmp.target = %target, snmp.local_addr = %local_addr },
            "UDP transport connected"
        );

        Ok(Self {
            inner: Arc::new(UdpTransportInner {
                socket,
                target,
                local_addr,
            }),
        })
    }
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("target", &self.inner.target)
            .field("local_addr", &self.inner.local_addr)
            .finish()
    }
}

impl Transport for UdpTransport {
    async fn send(&self, data: &[u8]) -> Result<()> {
        tracing::trace!(target: "snmp_cache::transport", { snmp.target = %self.inner.target, snmp.bytes = data.len() }, "UDP send");
        self.inner.socket.send(data).await.map_err(|source| {
            Error::Network {
                target: self.inner.target,
                source,
            }
            .boxed()
        })?;
        Ok(())
    }

    /// Datagrams whose id does not match (late answers to an earlier
    /// attempt) are dropped and the wait continues until the deadline.
    async fn recv(&self, request_id: i32, recv_timeout: Duration) -> Result<(Bytes, SocketAddr)> {
        let deadline = Instant::now() + recv_timeout;
        let target = self.inner.target;
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            let len = match timeout_at(deadline, self.inner.socket.recv(&mut buf)).await {
                Ok(Ok(len)) => len,
                Ok(Err(source)) => {
                    tracing::trace!(target: "snmp_cache::transport", { snmp.target = %target, error = %source }, "UDP recv error");
                    return Err(Error::Network { target, source }.boxed());
                }
                Err(_) => {
                    tracing::trace!(target: "snmp_cache::transport", { snmp.target = %target, snmp.request_id = request_id }, "UDP recv timeout");
                    return Err(Error::Timeout {
                        target,
                        elapsed: recv_timeout,
                        retries: 0,
                    }
                    .boxed());
                }
            };

            let data = &buf[..len];
            match extract_request_id(data) {
                Some(id) if id != request_id => {
                    tracing::debug!(
                        target: "snmp_cache::transport",
                        { snmp.target = %target, snmp.request_id = request_id, snmp.received_id = id },
                        "discarding response with mismatched request id"
                    );
                }
                _ => {
                    tracing::trace!(target: "snmp_cache::transport", { snmp.target = %target, snmp.bytes = len }, "UDP recv complete");
                    return Ok((Bytes::copy_from_slice(data), target));
                }
            }
        }
    }

    fn peer_addr(&self) -> SocketAddr {
        self.inner.target
    }

    fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }
}

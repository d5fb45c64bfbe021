//! Mock transport for tests and offline use.
//!
//! Responses come from a queue first. When the queue is empty and a
//! [`MockAgent`] is attached, the agent answers v1/v2c requests from an
//! in-memory OID tree.

use std::collections::{BTreeMap, VecDeque};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;

use super::{Transport, extract_request_id};
use crate::error::{Error, Result};
use crate::message::{CommunityMessage, Message, V3MessageData};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::value::Value;
use crate::varbind::VarBind;

/// A queued response.
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Community message whose request id is patched to match the request.
    Data(Bytes),
    /// Returned byte-for-byte.
    RawData(Bytes),
    Timeout,
    IoError(String),
}

/// A request sent through the mock transport.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub data: Bytes,
    pub request_id: Option<i32>,
}

impl RecordedRequest {
    /// The decoded PDU, when the request was a plaintext message.
    pub fn pdu(&self) -> Option<Pdu> {
        Message::decode(self.data.clone()).ok()?.try_into_pdu()
    }
}

/// In-memory agent answering GET, GETNEXT and GETBULK.
#[derive(Clone, Debug, Default)]
pub struct MockAgent {
    tree: BTreeMap<Oid, Value>,
}

impl MockAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, oid: Oid, value: Value) -> &mut Self {
        self.tree.insert(oid, value);
        self
    }

    pub fn with(mut self, oid: Oid, value: Value) -> Self {
        self.tree.insert(oid, value);
        self
    }

    fn get(&self, oid: &Oid) -> VarBind {
        let value = self.tree.get(oid).cloned().unwrap_or(Value::NoSuchObject);
        VarBind::new(oid.clone(), value)
    }

    fn get_next(&self, oid: &Oid) -> VarBind {
        use std::ops::Bound;
        match self
            .tree
            .range((Bound::Excluded(oid.clone()), Bound::Unbounded))
            .next()
        {
            Some((next, value)) => VarBind::new(next.clone(), value.clone()),
            None => VarBind::new(oid.clone(), Value::EndOfMibView),
        }
    }

    /// Answer a request PDU.
    pub fn respond(&self, request: &Pdu) -> Pdu {
        let varbinds = match request.pdu_type {
            PduType::GetRequest => request.varbinds.iter().map(|vb| self.get(&vb.oid)).collect(),
            PduType::GetNextRequest => request
                .varbinds
                .iter()
                .map(|vb| self.get_next(&vb.oid))
                .collect(),
            PduType::GetBulkRequest => self.get_bulk(request),
            PduType::Response | PduType::Report => Vec::new(),
        };
        Pdu::response(request.request_id, varbinds)
    }

    fn get_bulk(&self, request: &Pdu) -> Vec<VarBind> {
        let non_repeaters = usize::try_from(request.error_status)
            .unwrap_or(0)
            .min(request.varbinds.len());
        let max_repetitions = usize::try_from(request.error_index).unwrap_or(0);

        let (fixed, repeating) = request.varbinds.split_at(non_repeaters);
        let mut out: Vec<VarBind> = fixed.iter().map(|vb| self.get_next(&vb.oid)).collect();

        let mut cursors: Vec<Oid> = repeating.iter().map(|vb| vb.oid.clone()).collect();
        for _ in 0..max_repetitions {
            let row: Vec<VarBind> = cursors.iter().map(|oid| self.get_next(oid)).collect();
            let finished = row.iter().all(|vb| vb.value == Value::EndOfMibView);
            for (cursor, vb) in cursors.iter_mut().zip(&row) {
                *cursor = vb.oid.clone();
            }
            out.extend(row);
            if finished {
                break;
            }
        }
        out
    }
}

struct MockTransportInner {
    target: SocketAddr,
    responses: VecDeque<MockResponse>,
    requests: Vec<RecordedRequest>,
    agent: Option<MockAgent>,
}

/// Programmable transport.
///
/// ```rust
/// use snmp_cache::transport::{MockAgent, MockTransport};
/// use snmp_cache::{Value, oid};
///
/// let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
/// mock.set_agent(MockAgent::new().with(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("edge-1")));
/// mock.queue_timeout();
/// ```
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

impl MockTransport {
    pub fn new(target: SocketAddr) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockTransportInner {
                target,
                responses: VecDeque::new(),
                requests: Vec::new(),
                agent: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a community response; its request id is rewritten to match.
    pub fn queue_response(&self, data: impl Into<Bytes>) {
        self.lock().responses.push_back(MockResponse::Data(data.into()));
    }

    pub fn queue_raw_response(&self, data: impl Into<Bytes>) {
        self.lock().responses.push_back(MockResponse::RawData(data.into()));
    }

    pub fn queue_timeout(&self) {
        self.lock().responses.push_back(MockResponse::Timeout);
    }

    pub fn queue_io_error(&self, msg: impl Into<String>) {
        self.lock().responses.push_back(MockResponse::IoError(msg.into()));
    }

    /// Answer from `agent` whenever the queue is empty.
    pub fn set_agent(&self, agent: MockAgent) {
        self.lock().agent = Some(agent);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    pub fn queued_response_count(&self) -> usize {
        self.lock().responses.len()
    }

    /// Community messages and unauthenticated v3 messages get the request
    /// id (and msgID) rewritten; anything else would break its HMAC.
    fn patch_request_id(data: Bytes, request_id: i32) -> Bytes {
        match Message::decode(data.clone()) {
            Ok(Message::Community(mut msg)) => {
                msg.pdu.request_id = request_id;
                msg.encode()
            }
            Ok(Message::V3(mut msg)) if !msg.security_level().requires_auth() => {
                msg.global_data.msg_id = request_id;
                if let V3MessageData::Plaintext(scoped) = &mut msg.data {
                    scoped.pdu.request_id = request_id;
                }
                msg.encode()
            }
            _ => data,
        }
    }

    fn agent_answer(agent: &MockAgent, request: &Bytes) -> Option<Bytes> {
        match Message::decode(request.clone()).ok()? {
            Message::Community(msg) => {
                let response = agent.respond(&msg.pdu);
                Some(
                    CommunityMessage {
                        version: msg.version,
                        community: msg.community,
                        pdu: response,
                    }
                    .encode(),
                )
            }
            Message::V3(_) => None,
        }
    }
}

impl Transport for MockTransport {
    async fn send(&self, data: &[u8]) -> Result<()> {
        let data = Bytes::copy_from_slice(data);
        let request_id = extract_request_id(&data);
        self.lock().requests.push(RecordedRequest { data, request_id });
        Ok(())
    }

    async fn recv(&self, request_id: i32, timeout: Duration) -> Result<(Bytes, SocketAddr)> {
        let (response, target) = {
            let mut inner = self.lock();
            let response = inner.responses.pop_front().or_else(|| {
                let agent = inner.agent.as_ref()?;
                let last = inner.requests.last()?;
                Self::agent_answer(agent, &last.data).map(MockResponse::RawData)
            });
            (response, inner.target)
        };

        match response {
            Some(MockResponse::Data(data)) => Ok((Self::patch_request_id(data, request_id), target)),
            Some(MockResponse::RawData(data)) => Ok((data, target)),
            Some(MockResponse::IoError(msg)) => Err(Error::Network {
                target,
                source: std::io::Error::other(msg),
            }
            .boxed()),
            Some(MockResponse::Timeout) | None => {
                tokio::time::sleep(timeout).await;
                Err(Error::Timeout {
                    target,
                    elapsed: timeout,
                    retries: 0,
                }
                .boxed())
            }
        }
    }

    fn peer_addr(&self) -> SocketAddr {
        self.lock().target
    }

    fn local_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, 0))
    }
}

/// Builds v2c Response messages for tests.
pub struct ResponseBuilder {
    request_id: i32,
    varbinds: Vec<VarBind>,
    error_status: i32,
    error_index: i32,
}

impl ResponseBuilder {
    pub fn new(request_id: i32) -> Self {
        Self {
            request_id,
            varbinds: Vec::new(),
            error_status: 0,
            error_index: 0,
        }
    }

    pub fn varbind(mut self, oid: Oid, value: Value) -> Self {
        self.varbinds.push(VarBind::new(oid, value));
        self
    }

    pub fn error_status(mut self, status: i32) -> Self {
        self.error_status = status;
        self
    }

    pub fn error_index(mut self, index: i32) -> Self {
        self.error_index = index;
        self
    }

    pub fn build_v2c(self, community: &[u8]) -> Bytes {
        let pdu = Pdu {
            pdu_type: PduType::Response,
            request_id: self.request_id,
            error_status: self.error_status,
            error_index: self.error_index,
            varbinds: self.varbinds,
        };
        CommunityMessage::v2c(Bytes::copy_from_slice(community), pdu).encode()
    }
}

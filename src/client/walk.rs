//! Subtree walk streams.
//!
//! [`Walk`] uses GETNEXT, [`BulkWalk`] uses GETBULK and [`WalkStream`]
//! picks one of them from the client's [`WalkMode`]. All three end on
//! `endOfMibView` or on the first OID outside the requested subtree.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::error::{Error, Result, WalkAbortReason};
use crate::oid::Oid;
use crate::transport::Transport;
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

use super::Client;

type Pending<R> = Pin<Box<dyn Future<Output = Result<R>> + Send>>;

/// Which request a walk uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WalkMode {
    /// GETBULK for v2c/v3, GETNEXT for v1.
    #[default]
    Auto,
    GetNext,
    GetBulk,
}

/// How a walk reacts to agents returning OIDs out of order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OidOrdering {
    /// Every OID must be greater than the one before it.
    #[default]
    Strict,
    /// Allow out-of-order OIDs; abort only when one repeats.
    AllowNonIncreasing,
}

enum OidTracker {
    Strict { last: Option<Oid> },
    Relaxed { seen: HashSet<Oid> },
}

impl OidTracker {
    fn new(ordering: OidOrdering) -> Self {
        match ordering {
            OidOrdering::Strict => OidTracker::Strict { last: None },
            OidOrdering::AllowNonIncreasing => OidTracker::Relaxed {
                seen: HashSet::new(),
            },
        }
    }

    fn check(&mut self, oid: &Oid) -> std::result::Result<(), WalkAbortReason> {
        match self {
            OidTracker::Strict { last } => {
                if let Some(prev) = last.as_ref() {
                    if oid == prev {
                        return Err(WalkAbortReason::Cycle);
                    }
                    if oid < prev {
                        return Err(WalkAbortReason::NonIncreasing);
                    }
                }
                *last = Some(oid.clone());
                Ok(())
            }
            OidTracker::Relaxed { seen } => {
                if !seen.insert(oid.clone()) {
                    return Err(WalkAbortReason::Cycle);
                }
                Ok(())
            }
        }
    }
}

/// Shared end-of-walk and ordering checks.
struct WalkState {
    base_oid: Oid,
    current_oid: Oid,
    tracker: OidTracker,
    done: bool,
}

impl WalkState {
    fn new(oid: Oid, ordering: OidOrdering) -> Self {
        Self {
            base_oid: oid.clone(),
            current_oid: oid,
            tracker: OidTracker::new(ordering),
            done: false,
        }
    }

    /// `None` ends the walk; `Some(Err)` aborts it.
    fn accept<T: Transport>(&mut self, client: &Client<T>, vb: VarBind) -> Option<Result<VarBind>> {
        if matches!(vb.value, Value::EndOfMibView) || !vb.oid.starts_with(&self.base_oid) {
            self.done = true;
            return None;
        }

        if let Err(reason) = self.tracker.check(&vb.oid) {
            self.done = true;
            tracing::debug!(
                target: "snmp_cache::client",
                { snmp.target = %client.peer_addr(), snmp.oid = %vb.oid, snmp.previous = %self.current_oid },
                "aborting walk: {}", reason
            );
            return Some(Err(Error::WalkAborted {
                target: client.peer_addr(),
                reason,
            }
            .boxed()));
        }

        self.current_oid = vb.oid.clone();
        Some(Ok(vb))
    }
}

/// GETNEXT walk.
pub struct Walk<T: Transport> {
    client: Client<T>,
    state: WalkState,
    pending: Option<Pending<VarBind>>,
}

impl<T: Transport> Walk<T> {
    pub(crate) fn new(client: Client<T>, oid: Oid, ordering: OidOrdering) -> Self {
        Self {
            client,
            state: WalkState::new(oid, ordering),
            pending: None,
        }
    }
}

impl<T: Transport + 'static> Walk<T> {
    pub async fn next(&mut self) -> Option<Result<VarBind>> {
        std::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }

    /// Drain the walk, stopping at the first error.
    pub async fn collect(mut self) -> Result<Vec<VarBind>> {
        let mut results = Vec::new();
        while let Some(result) = self.next().await {
            results.push(result?);
        }
        Ok(results)
    }
}

impl<T: Transport + 'static> Stream for Walk<T> {
    type Item = Result<VarBind>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if this.state.done {
                return Poll::Ready(None);
            }

            let Some(pending) = this.pending.as_mut() else {
                let client = this.client.clone();
                let oid = this.state.current_oid.clone();
                this.pending = Some(Box::pin(async move { client.get_next(&oid).await }));
                continue;
            };

            let result = match pending.as_mut().poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(result) => result,
            };
            this.pending = None;

            return Poll::Ready(match result {
                Ok(vb) => this.state.accept(&this.client, vb),
                Err(e) => {
                    this.state.done = true;
                    Some(Err(e))
                }
            });
        }
    }
}

/// GETBULK walk.
pub struct BulkWalk<T: Transport> {
    client: Client<T>,
    state: WalkState,
    max_repetitions: i32,
    buffer: std::vec::IntoIter<VarBind>,
    pending: Option<Pending<Vec<VarBind>>>,
}

impl<T: Transport> BulkWalk<T> {
    pub(crate) fn new(client: Client<T>, oid: Oid, max_repetitions: i32, ordering: OidOrdering) -> Self {
        Self {
            client,
            state: WalkState::new(oid, ordering),
            max_repetitions: max_repetitions.max(1),
            buffer: Vec::new().into_iter(),
            pending: None,
        }
    }
}

impl<T: Transport + 'static> BulkWalk<T> {
    pub async fn next(&mut self) -> Option<Result<VarBind>> {
        std::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }

    pub async fn collect(mut self) -> Result<Vec<VarBind>> {
        let mut results = Vec::new();
        while let Some(result) = self.next().await {
            results.push(result?);
        }
        Ok(results)
    }
}

impl<T: Transport + 'static> Stream for BulkWalk<T> {
    type Item = Result<VarBind>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if this.state.done {
                return Poll::Ready(None);
            }

            if let Some(vb) = this.buffer.next() {
                return Poll::Ready(this.state.accept(&this.client, vb));
            }

            let Some(pending) = this.pending.as_mut() else {
                let client = this.client.clone();
                let oid = this.state.current_oid.clone();
                let max_rep = this.max_repetitions;
                this.pending = Some(Box::pin(async move {
                    client.get_bulk(std::slice::from_ref(&oid), 0, max_rep).await
                }));
                continue;
            };

            let result = match pending.as_mut().poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(result) => result,
            };
            this.pending = None;

            match result {
                Ok(varbinds) if varbinds.is_empty() => {
                    this.state.done = true;
                    return Poll::Ready(None);
                }
                Ok(varbinds) => this.buffer = varbinds.into_iter(),
                Err(e) => {
                    this.state.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
            }
        }
    }
}

/// GETNEXT or GETBULK walk chosen at construction.
pub enum WalkStream<T: Transport> {
    GetNext(Walk<T>),
    GetBulk(BulkWalk<T>),
}

impl<T: Transport> WalkStream<T> {
    pub(crate) fn new(
        client: Client<T>,
        oid: Oid,
        version: Version,
        walk_mode: WalkMode,
        ordering: OidOrdering,
        max_repetitions: i32,
    ) -> Result<Self> {
        let use_bulk = match walk_mode {
            WalkMode::Auto => version != Version::V1,
            WalkMode::GetNext => false,
            WalkMode::GetBulk if version == Version::V1 => {
                return Err(Error::Config("GETBULK is not supported in SNMPv1".into()).boxed());
            }
            WalkMode::GetBulk => true,
        };

        Ok(if use_bulk {
            WalkStream::GetBulk(BulkWalk::new(client, oid, max_repetitions, ordering))
        } else {
            WalkStream::GetNext(Walk::new(client, oid, ordering))
        })
    }
}

impl<T: Transport + 'static> WalkStream<T> {
    pub async fn next(&mut self) -> Option<Result<VarBind>> {
        std::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }

    pub async fn collect(mut self) -> Result<Vec<VarBind>> {
        let mut results = Vec::new();
        while let Some(result) = self.next().await {
            results.push(result?);
        }
        Ok(results)
    }
}

impl<T: Transport + 'static> Stream for WalkStream<T> {
    type Item = Result<VarBind>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.get_mut() {
            WalkStream::GetNext(walk) => Pin::new(walk).poll_next(cx),
            WalkStream::GetBulk(walk) => Pin::new(walk).poll_next(cx),
        }
    }
}

//! Event dispatcher: stack context → application queue.
//!
//! Stack handlers raise events synchronously through [`EventSink`]. The
//! dispatcher validates the kind against the raising profile, copies the
//! payload, correlates responses with the pending-request tracker and
//! pushes the result onto the event queue without ever waiting for the
//! application.

use embassy_sync::channel::TrySendError;
use embassy_time::Instant;
use log::{debug, warn};
use serde::de::DeserializeOwned;

use super::Shared;
use super::channels::TxnId;
use super::pending::{Claim, PendingEntry, PendingState, ResponseKey};
use super::registry::Cloned;
use crate::error::DispatchError;
use crate::mesh::Profile;
use crate::mesh::actions::Peer;
use crate::mesh::events::EventKind;
use crate::mesh::types::{ClientParams, ConnHandle, ModelHandle, MsgCtx};

// ── Delivered event ───────────────────────────────────────────

/// The request an event answers (or the request it reports on, for
/// `Timeout` and `Cancelled`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestRecord {
    pub txn: TxnId,
    pub request_opcode: u32,
    pub expected_opcode: u32,
    pub params: Option<ClientParams>,
    /// Terminal state the request reached.
    pub state: PendingState,
}

impl From<&PendingEntry> for RequestRecord {
    fn from(e: &PendingEntry) -> Self {
        Self {
            txn: e.txn,
            request_opcode: e.request_opcode,
            expected_opcode: e.expected_opcode,
            params: e.params,
            state: e.state,
        }
    }
}

/// An event queued for the application context.
#[derive(Debug)]
pub struct MeshEvent {
    pub profile: Profile,
    pub kind: EventKind,
    pub opcode: u32,
    pub model: Option<ModelHandle>,
    pub ctx: MsgCtx,
    pub request: Option<RequestRecord>,
    pub raised_at: Instant,
    payload: Option<Cloned<Vec<u8>>>,
}

impl MeshEvent {
    pub fn payload(&self) -> &[u8] {
        self.payload
            .as_deref()
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Decode a `postcard`-encoded status payload.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, postcard::Error> {
        postcard::from_bytes(self.payload())
    }

    pub fn txn(&self) -> Option<TxnId> {
        self.request.map(|r| r.txn)
    }

    /// Timeout or cancellation report for a request that left the tracker.
    pub(crate) fn synthetic(entry: &PendingEntry, kind: EventKind) -> Self {
        Self {
            profile: entry.profile,
            kind,
            opcode: entry.request_opcode,
            model: entry.model,
            ctx: entry.params.map(|p| p.ctx).unwrap_or_default(),
            request: Some(RequestRecord::from(entry)),
            raised_at: Instant::now(),
            payload: None,
        }
    }
}

// ── Raise request ─────────────────────────────────────────────

/// An event as handed over by a stack handler. The payload is borrowed
/// and copied before `raise` returns.
#[derive(Debug, Clone, Copy)]
pub struct RaisedEvent<'a> {
    pub profile: Profile,
    pub kind: EventKind,
    pub opcode: u32,
    pub model: Option<ModelHandle>,
    pub ctx: MsgCtx,
    /// Request being answered, when the stack knows it.
    pub txn: Option<TxnId>,
    pub payload: &'a [u8],
}

impl<'a> RaisedEvent<'a> {
    pub fn new(profile: Profile, kind: EventKind, opcode: u32) -> Self {
        Self {
            profile,
            kind,
            opcode,
            model: None,
            ctx: MsgCtx::default(),
            txn: None,
            payload: &[],
        }
    }

    #[must_use]
    pub fn model(mut self, model: ModelHandle) -> Self {
        self.model = Some(model);
        self
    }

    #[must_use]
    pub fn ctx(mut self, ctx: MsgCtx) -> Self {
        self.ctx = ctx;
        self
    }

    #[must_use]
    pub fn txn(mut self, txn: TxnId) -> Self {
        self.txn = Some(txn);
        self
    }

    #[must_use]
    pub fn payload(mut self, payload: &'a [u8]) -> Self {
        self.payload = payload;
        self
    }

    /// The party that sent this event: the proxy server for filter
    /// status, otherwise the source node.
    fn peer(&self) -> Peer {
        match (self.kind, self.ctx.bearer.connection()) {
            (EventKind::FilterStatus, Some(conn)) => Peer::Proxy(conn),
            _ => Peer::Node(self.ctx.addr),
        }
    }

    fn response_key(&self) -> ResponseKey {
        ResponseKey {
            profile: self.profile,
            opcode: self.opcode,
            peer: self.peer(),
            model: self.model,
        }
    }
}

/// Port through which stack-context code hands events to the bridge.
pub trait EventSink {
    /// Queue an event for the application. Returns the transaction the
    /// event answered, if any. Never blocks.
    fn raise(&self, event: RaisedEvent<'_>) -> Result<Option<TxnId>, DispatchError>;
}

// ── Dispatch ──────────────────────────────────────────────────

impl<const CALLS: usize, const EVENTS: usize> EventSink for Shared<CALLS, EVENTS> {
    fn raise(&self, ev: RaisedEvent<'_>) -> Result<Option<TxnId>, DispatchError> {
        if !self.is_running() {
            return Err(DispatchError::NotInitialized);
        }
        if !ev.profile.produces(ev.kind) {
            warn!("Events: {} cannot raise {:?}", ev.profile, ev.kind);
            return Err(DispatchError::UnknownEventType);
        }
        self.counters.raised();

        // Copy first so a failed copy cannot consume a pending entry.
        let payload = if ev.payload.is_empty() {
            None
        } else {
            match self.registry.clone_event(ev.profile, ev.payload) {
                Ok(copy) => Some(copy),
                Err(e) => {
                    warn!("Events: {} {:?} payload copy failed: {}", ev.profile, ev.kind, e);
                    return Err(e.into());
                }
            }
        };

        if ev.profile == Profile::ProxyClient && ev.kind == EventKind::Disconnected {
            if let Some(conn) = ev.ctx.bearer.connection() {
                self.cancel_owner(conn);
            }
        }

        let request = if ev.kind.is_response() {
            match self.pending.take_response(ev.txn, &ev.response_key()) {
                Claim::Answered(entry) => Some(RequestRecord::from(&entry)),
                Claim::Ended => {
                    debug!(
                        "Events: late {:?} opcode=0x{:04X} from {:?} for an ended request, dropped",
                        ev.kind,
                        ev.opcode,
                        ev.peer()
                    );
                    self.counters.stale();
                    return Ok(None);
                }
                Claim::Unknown if ev.kind.requires_request() => {
                    debug!(
                        "Events: stale {:?} opcode=0x{:04X} from {:?}, dropped",
                        ev.kind,
                        ev.opcode,
                        ev.peer()
                    );
                    self.counters.stale();
                    return Ok(None);
                }
                Claim::Unknown => None,
            }
        } else {
            None
        };

        let event = MeshEvent {
            profile: ev.profile,
            kind: ev.kind,
            opcode: ev.opcode,
            model: ev.model,
            ctx: ev.ctx,
            request,
            raised_at: Instant::now(),
            payload,
        };
        let txn = event.txn();
        self.push_event(event)?;
        Ok(txn)
    }
}

impl<const CALLS: usize, const EVENTS: usize> Shared<CALLS, EVENTS> {
    /// Non-blocking enqueue. A rejected event is dropped here, which
    /// releases its payload.
    pub(crate) fn push_event(&self, event: MeshEvent) -> Result<(), DispatchError> {
        match self.events.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(dropped)) => {
                warn!(
                    "Events: queue full, dropping {} {:?}",
                    dropped.profile, dropped.kind
                );
                self.counters.event_dropped();
                Err(DispatchError::QueueFull)
            }
        }
    }

    /// Queue the `Timeout` or `Cancelled` report for an entry that left
    /// the tracker. If the queue is full the entry is held back and
    /// reported later by [`report_deferred`](Self::report_deferred).
    fn report(&self, entry: PendingEntry) {
        if self.pending.unreported() > 0 || !self.offer_synthetic(&entry) {
            debug!("Pending: {} report deferred, event queue full", entry.txn);
            self.pending.defer(entry);
        }
    }

    fn offer_synthetic(&self, entry: &PendingEntry) -> bool {
        let kind = match entry.state {
            PendingState::Cancelled => EventKind::Cancelled,
            _ => EventKind::Timeout,
        };
        self.events
            .try_send(MeshEvent::synthetic(entry, kind))
            .is_ok()
    }

    /// Queue held-back reports in order until the queue fills again.
    /// Returns how many are still waiting.
    pub(crate) fn report_deferred(&self) -> usize {
        while let Some(entry) = self.pending.next_unreported() {
            if !self.offer_synthetic(&entry) {
                self.pending.restore_unreported(entry);
                break;
            }
        }
        self.pending.unreported()
    }

    /// Purge every request owned by `conn`, reporting each as `Cancelled`.
    pub(crate) fn cancel_owner(&self, conn: ConnHandle) -> usize {
        let purged = self.pending.cancel_owner(conn);
        if !purged.is_empty() {
            debug!("Pending: connection {} lost, cancelling {}", conn, purged.len());
        }
        let n = purged.len();
        for entry in purged {
            self.counters.cancelled();
            self.report(entry);
        }
        n
    }

    /// Report every request whose deadline passed as `Timeout`.
    pub(crate) fn expire_due(&self) -> usize {
        let due = self.pending.expire(Instant::now());
        let n = due.len();
        for entry in due {
            debug!(
                "Pending: {} {} opcode=0x{:04X} timed out",
                entry.txn, entry.profile, entry.request_opcode
            );
            self.counters.timed_out();
            self.report(entry);
        }
        n
    }
}

//! Pending-request tracker.
//!
//! One entry per outstanding request that expects a status response.
//! Entries live in a fixed-capacity table behind a critical-section
//! mutex shared by both contexts. Leaving the table is the terminal
//! transition and happens under the lock, so exactly one of response,
//! timeout, cancellation or rollback claims each entry.
//!
//! ```text
//!   insert ──▶ Sent ──(executor dequeues)──▶ WaitResponse
//!                │                               │
//!                ├── discard (enqueue failed)    ├── take_response ──▶ Responded
//!                ├── cancel_owner ──▶ Cancelled  ├── expire ─────────▶ TimedOut
//!                                                └── cancel_owner ───▶ Cancelled
//!
//!   TimedOut / Cancelled ──▶ ended (late responses are stale)
//!                        └─▶ unreported, while the event queue is full
//! ```
//!
//! A request whose terminal event could not be queued yet stays in the
//! unreported list and still counts against [`MAX_PENDING`].

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::Instant;
use heapless::Vec;

use super::channels::TxnId;
use crate::error::DispatchError;
use crate::mesh::Profile;
use crate::mesh::actions::Peer;
use crate::mesh::types::{ClientParams, ConnHandle, ModelHandle};

/// Maximum number of concurrently outstanding requests.
pub const MAX_PENDING: usize = 32;

/// How many timed-out or cancelled requests are remembered so that their
/// late responses can be recognised.
pub const MAX_ENDED: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingState {
    /// Inserted at submit, not yet picked up by the stack context.
    Sent,
    /// Handed to the stack; waiting for a status.
    WaitResponse,
    Responded,
    TimedOut,
    Cancelled,
}

impl PendingState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Responded | Self::TimedOut | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingEntry {
    pub txn: TxnId,
    pub profile: Profile,
    pub request_opcode: u32,
    pub expected_opcode: u32,
    pub peer: Peer,
    /// Connection whose loss cancels this request.
    pub owner: Option<ConnHandle>,
    pub model: Option<ModelHandle>,
    pub params: Option<ClientParams>,
    pub deadline: Instant,
    pub state: PendingState,
}

/// What an incoming response is matched on when it carries no txn id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseKey {
    pub profile: Profile,
    pub opcode: u32,
    pub peer: Peer,
    pub model: Option<ModelHandle>,
}

/// Outcome of matching a response against the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// Answers an outstanding request, now `Responded`.
    Answered(PendingEntry),
    /// Answers a request that already timed out or was cancelled.
    Ended,
    /// Not related to any known request.
    Unknown,
}

impl PendingEntry {
    fn answers(&self, txn: Option<TxnId>, key: &ResponseKey) -> bool {
        match txn {
            Some(txn) => self.txn == txn && self.profile == key.profile,
            None => {
                self.profile == key.profile
                    && self.expected_opcode == key.opcode
                    && self.peer == key.peer
                    && match (self.model, key.model) {
                        (Some(a), Some(b)) => a == b,
                        _ => true,
                    }
            }
        }
    }
}

#[derive(Default)]
struct Table {
    live: Vec<PendingEntry, MAX_PENDING>,
    /// Terminal, but the event reporting it is not queued yet.
    unreported: Vec<PendingEntry, MAX_PENDING>,
    /// Recently timed out or cancelled, oldest first.
    ended: Vec<PendingEntry, MAX_ENDED>,
}

impl Table {
    fn remember(&mut self, entry: PendingEntry) {
        if self.ended.is_full() {
            self.ended.remove(0);
        }
        // Room was made above.
        let _ = self.ended.push(entry);
    }
}

pub struct PendingTracker {
    table: Mutex<CriticalSectionRawMutex, RefCell<Table>>,
}

impl Default for PendingTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingTracker {
    pub const fn new() -> Self {
        Self {
            table: Mutex::new(RefCell::new(Table {
                live: Vec::new(),
                unreported: Vec::new(),
                ended: Vec::new(),
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Table) -> R) -> R {
        self.table.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Register a new request. Rejects a duplicate of a request still
    /// outstanding to the same peer for the same status.
    pub fn insert(&self, entry: PendingEntry) -> Result<(), DispatchError> {
        self.with(|table| {
            if table.live.iter().any(|e| {
                e.profile == entry.profile
                    && e.peer == entry.peer
                    && e.expected_opcode == entry.expected_opcode
            }) {
                return Err(DispatchError::Busy);
            }
            if table.live.len() + table.unreported.len() >= MAX_PENDING {
                return Err(DispatchError::PendingFull);
            }
            table.live.push(entry).map_err(|_| DispatchError::PendingFull)
        })
    }

    /// `Sent → WaitResponse`. Returns false if the entry already left.
    pub fn mark_waiting(&self, txn: TxnId) -> bool {
        self.with(|table| match table.live.iter_mut().find(|e| e.txn == txn) {
            Some(entry) => {
                entry.state = PendingState::WaitResponse;
                true
            }
            None => false,
        })
    }

    /// Claim the entry a response answers: by `txn` when the stack
    /// supplied one, otherwise the oldest entry matching `key`. A
    /// response to a request that already ended consumes that memory.
    pub fn take_response(&self, txn: Option<TxnId>, key: &ResponseKey) -> Claim {
        self.with(|table| {
            if let Some(idx) = table.live.iter().position(|e| e.answers(txn, key)) {
                let mut entry = table.live.remove(idx);
                entry.state = PendingState::Responded;
                return Claim::Answered(entry);
            }
            match table.ended.iter().position(|e| e.answers(txn, key)) {
                Some(idx) => {
                    table.ended.remove(idx);
                    Claim::Ended
                }
                None => Claim::Unknown,
            }
        })
    }

    /// Roll back an insert whose enqueue failed.
    pub fn discard(&self, txn: TxnId) -> Option<PendingEntry> {
        self.with(|table| {
            let idx = table.live.iter().position(|e| e.txn == txn)?;
            Some(table.live.remove(idx))
        })
    }

    /// Remove every entry whose deadline is at or before `now`.
    pub fn expire(&self, now: Instant) -> Vec<PendingEntry, MAX_PENDING> {
        self.drain_where(PendingState::TimedOut, |e| e.deadline <= now)
    }

    /// Remove every entry travelling over connection `owner`.
    pub fn cancel_owner(&self, owner: ConnHandle) -> Vec<PendingEntry, MAX_PENDING> {
        self.drain_where(PendingState::Cancelled, |e| e.owner == Some(owner))
    }

    /// Remove everything, reported or not. Used at shutdown.
    pub fn cancel_all(&self) -> usize {
        self.with(|table| {
            let n = table.live.len() + table.unreported.len();
            table.live.clear();
            table.unreported.clear();
            table.ended.clear();
            n
        })
    }

    fn drain_where(
        &self,
        state: PendingState,
        pred: impl Fn(&PendingEntry) -> bool,
    ) -> Vec<PendingEntry, MAX_PENDING> {
        self.with(|table| {
            let mut out: Vec<PendingEntry, MAX_PENDING> = Vec::new();
            table.live.retain(|e| {
                if pred(e) {
                    let mut gone = *e;
                    gone.state = state;
                    // `out` has the same capacity as the table.
                    let _ = out.push(gone);
                    false
                } else {
                    true
                }
            });
            for e in &out {
                table.remember(*e);
            }
            out
        })
    }

    // ── Deferred reports ──────────────────────────────────────

    /// Hold a terminal entry whose event did not fit in the queue.
    pub fn defer(&self, entry: PendingEntry) {
        self.with(|table| {
            // Live and unreported together never exceed MAX_PENDING.
            let _ = table.unreported.push(entry);
        });
    }

    /// Oldest deferred entry, removed from the list.
    pub fn next_unreported(&self) -> Option<PendingEntry> {
        self.with(|table| {
            if table.unreported.is_empty() {
                None
            } else {
                Some(table.unreported.remove(0))
            }
        })
    }

    /// Put back an entry taken by [`next_unreported`](Self::next_unreported)
    /// that still could not be reported, keeping its place in line.
    pub fn restore_unreported(&self, entry: PendingEntry) {
        self.with(|table| {
            let _ = table.unreported.insert(0, entry);
        });
    }

    pub fn unreported(&self) -> usize {
        self.with(|table| table.unreported.len())
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.with(|table| table.live.iter().map(|e| e.deadline).min())
    }

    pub fn state(&self, txn: TxnId) -> Option<PendingState> {
        self.with(|table| table.live.iter().find(|e| e.txn == txn).map(|e| e.state))
    }

    /// Requests still waiting for a response.
    pub fn len(&self) -> usize {
        self.with(|table| table.live.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Inter-context queues and the call envelope.
//!
//! Uses `embassy-sync` bounded MPMC channels to bridge the application
//! context with the stack context. One channel per direction; neither
//! side ever touches the other's queue entries after the handoff.
//!
//! ```text
//! ┌──────────────┐   Envelope    ┌──────────────┐
//! │ Application  │──────────────▶│ Stack worker │
//! │ (submit)     │◀──────────────│ (handlers)   │
//! └──────────────┘   MeshEvent   └──────────────┘
//! ```

use core::fmt;
use std::thread::ThreadId;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::Instant;

use super::events::MeshEvent;
use super::registry::Cloned;
use crate::mesh::Profile;
use crate::mesh::actions::Action;

/// Default depth of the application → stack queue.
pub const DEFAULT_CALL_DEPTH: usize = 16;

/// Default depth of the stack → application queue.
pub const DEFAULT_EVENT_DEPTH: usize = 32;

/// Identifier of a tracked request/response transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxnId(u32);

impl TxnId {
    pub(crate) const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A submitted call on its way to the stack context.
///
/// Owned by the call queue until dequeued, then by the executor until
/// the handler returns. Dropping it releases the copied arguments.
#[derive(Debug)]
pub struct Envelope {
    pub action: Cloned<Action>,
    /// Application thread that submitted the call.
    pub source: ThreadId,
    pub enqueued_at: Instant,
    /// Submission order across all profiles.
    pub seq: u32,
    /// Set when the call expects a response.
    pub txn: Option<TxnId>,
}

impl Envelope {
    pub fn profile(&self) -> Profile {
        self.action.profile()
    }
}

/// Application → stack.
pub type CallQueue<const N: usize> = Channel<CriticalSectionRawMutex, Envelope, N>;

/// Stack → application.
pub type EventQueue<const N: usize> = Channel<CriticalSectionRawMutex, MeshEvent, N>;

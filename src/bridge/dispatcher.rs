//! Call dispatcher: application context → stack queue.
//!
//! `submit` never retains or mutates the caller's action. Everything it
//! hands to the stack is a registry copy, and every failure after the
//! copy drops that copy before returning.

use std::sync::Arc;

use embassy_sync::channel::TrySendError;
use embassy_time::{Duration, Instant, with_timeout};
use futures_lite::future::block_on;
use log::{debug, warn};

use super::Shared;
use super::channels::{Envelope, TxnId};
use super::pending::{PendingEntry, PendingState};
use crate::config::QueueFullPolicy;
use crate::error::DispatchError;
use crate::mesh::actions::Action;

impl<const CALLS: usize, const EVENTS: usize> Shared<CALLS, EVENTS> {
    pub(crate) fn submit(&self, action: &Action) -> Result<Option<TxnId>, DispatchError> {
        if !self.is_running() {
            return Err(DispatchError::NotInitialized);
        }
        action.validate()?;
        let profile = action.profile();
        if !self.has_handler(profile) {
            return Err(DispatchError::UnknownActionType);
        }

        let copy = self.registry.clone_call(action).inspect_err(|e| {
            warn!("Bridge: {} argument copy failed: {}", profile, e);
            self.counters.rejected();
        })?;

        let txn = match action.expectation() {
            Some(exp) => {
                let txn = self.next_txn();
                let timeout_ms = self.config.response_timeout(profile, exp.timeout_ms);
                let entry = PendingEntry {
                    txn,
                    profile,
                    request_opcode: exp.request_opcode,
                    expected_opcode: exp.expected_opcode,
                    peer: exp.peer,
                    owner: exp.owner,
                    model: exp.model,
                    params: exp.params,
                    deadline: Instant::now() + Duration::from_millis(u64::from(timeout_ms)),
                    state: PendingState::Sent,
                };
                if let Err(e) = self.pending.insert(entry) {
                    debug!("Bridge: {} opcode=0x{:04X} rejected: {}", profile, exp.request_opcode, e);
                    self.counters.rejected();
                    return Err(e);
                }
                Some(txn)
            }
            None => None,
        };

        let envelope = Envelope {
            action: copy,
            source: std::thread::current().id(),
            enqueued_at: Instant::now(),
            seq: self.next_seq(),
            txn,
        };

        if let Err(e) = self.enqueue(envelope) {
            if let Some(txn) = txn {
                self.pending.discard(txn);
            }
            self.counters.rejected();
            return Err(e);
        }
        if !self.is_running() {
            // Shutdown raced this call and may already have drained.
            self.abandon(txn);
            return Err(DispatchError::NotInitialized);
        }
        self.counters.submitted();
        Ok(txn)
    }

    /// Undo a call that was queued after the bridge stopped. The stack
    /// worker is gone, so whatever is left in the queue is released here.
    fn abandon(&self, txn: Option<TxnId>) {
        if let Some(txn) = txn {
            self.pending.discard(txn);
        }
        while self.calls.try_receive().is_ok() {}
        debug!("Bridge: call submitted during shutdown, released");
    }

    /// Queue per the configured policy. On failure the envelope has
    /// already been dropped.
    fn enqueue(&self, envelope: Envelope) -> Result<(), DispatchError> {
        match self.config.queue_full_policy {
            QueueFullPolicy::Reject => match self.calls.try_send(envelope) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(rejected)) => {
                    warn!("Bridge: call queue full, rejecting {}", rejected.profile());
                    Err(DispatchError::QueueFull)
                }
            },
            QueueFullPolicy::Block => {
                let wait = Duration::from_millis(u64::from(self.config.submit_timeout_ms));
                block_on(with_timeout(wait, self.calls.send(envelope))).map_err(|_| {
                    warn!(
                        "Bridge: call queue still full after {}ms",
                        self.config.submit_timeout_ms
                    );
                    DispatchError::QueueFull
                })
            }
        }
    }
}

/// Cloneable submit handle for application threads.
pub struct Submitter<const CALLS: usize, const EVENTS: usize> {
    shared: Arc<Shared<CALLS, EVENTS>>,
}

impl<const CALLS: usize, const EVENTS: usize> Submitter<CALLS, EVENTS> {
    pub(crate) fn new(shared: Arc<Shared<CALLS, EVENTS>>) -> Self {
        Self { shared }
    }

    pub fn submit(&self, action: &Action) -> Result<Option<TxnId>, DispatchError> {
        self.shared.submit(action)
    }
}

impl<const CALLS: usize, const EVENTS: usize> Clone for Submitter<CALLS, EVENTS> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

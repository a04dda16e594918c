//! Stack-context executor.
//!
//! A single worker drains the call queue in FIFO order and runs one
//! handler at a time. The same loop owns the tracker's deadline timer,
//! so timeouts fire on the stack context too.
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────────┐
//!  │  mesh-stack thread                                       │
//!  │  futures_lite::block_on(or(stop, or(receive, Timer::at)))│
//!  │                                                          │
//!  │  Call(env) ─▶ mark WaitResponse ─▶ handler(&env, sink)   │
//!  │                                    └─▶ drop(env)         │
//!  │  any wake  ─▶ report_deferred(), expire_due() ─▶ Timeout │
//!  └──────────────────────────────────────────────────────────┘
//! ```

use core::future::pending;

use embassy_time::Timer;
use futures_lite::future::{block_on, or};
use log::{debug, info, warn};

use super::Shared;
use super::channels::Envelope;
use super::events::EventSink;
use crate::mesh::Profile;

/// Executes one action on the stack context. Responses are raised
/// through the sink; the executor never infers them.
pub type StackHandler = Box<dyn FnMut(&Envelope, &dyn EventSink) + Send>;

/// Per-profile stack handlers, moved into the executor at start.
pub struct StackHandlers {
    slots: [Option<StackHandler>; Profile::COUNT],
}

impl Default for StackHandlers {
    fn default() -> Self {
        Self::new()
    }
}

impl StackHandlers {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(
        mut self,
        profile: Profile,
        handler: impl FnMut(&Envelope, &dyn EventSink) + Send + 'static,
    ) -> Self {
        self.insert(profile, handler);
        self
    }

    pub fn insert(
        &mut self,
        profile: Profile,
        handler: impl FnMut(&Envelope, &dyn EventSink) + Send + 'static,
    ) {
        self.slots[profile.index()] = Some(Box::new(handler));
    }

    pub fn contains(&self, profile: Profile) -> bool {
        self.slots[profile.index()].is_some()
    }

    fn get_mut(&mut self, profile: Profile) -> Option<&mut StackHandler> {
        self.slots[profile.index()].as_mut()
    }
}

enum Wake {
    Stop,
    Call(Envelope),
    Deadline,
}

impl<const CALLS: usize, const EVENTS: usize> Shared<CALLS, EVENTS> {
    /// Body of the stack worker. Returns when the stop signal fires.
    pub(crate) fn run_executor(&self, mut handlers: StackHandlers) {
        info!("Stack: executor running");
        loop {
            let next_deadline = self.pending.next_deadline();
            let wake = block_on(or(
                async {
                    self.stop.wait().await;
                    Wake::Stop
                },
                or(
                    async { Wake::Call(self.calls.receive().await) },
                    async {
                        match next_deadline {
                            Some(at) => Timer::at(at).await,
                            None => pending::<()>().await,
                        }
                        Wake::Deadline
                    },
                ),
            ));

            match wake {
                Wake::Stop => break,
                Wake::Call(envelope) => self.execute(&mut handlers, envelope),
                Wake::Deadline => {}
            }
            self.report_deferred();
            self.expire_due();
        }
        debug!("Stack: executor stopped");
    }

    fn execute(&self, handlers: &mut StackHandlers, envelope: Envelope) {
        if let Some(txn) = envelope.txn {
            if !self.pending.mark_waiting(txn) {
                // Cancelled before it reached the stack.
                debug!("Stack: {} no longer pending, skipping {}", txn, envelope.profile());
                return;
            }
        }
        match handlers.get_mut(envelope.profile()) {
            Some(handler) => {
                handler(&envelope, self);
                self.counters.executed();
            }
            None => warn!("Stack: no handler for {}", envelope.profile()),
        }
        // `envelope` dropped here: arguments released.
    }
}

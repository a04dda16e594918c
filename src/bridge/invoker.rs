//! Callback invoker: application queue → registered callbacks.
//!
//! The event queue has a single consumer, the [`EventPump`]. It is taken
//! from the bridge once and either driven on a thread the application
//! already owns or moved onto a dedicated worker with
//! [`EventPump::spawn`].
//!
//! ```text
//!   EventQueue ──▶ EventPump ──▶ CallbackTable[profile] ──▶ Fn(&MeshEvent)
//!                     │
//!                     └── drop(event) = payload release
//! ```

use core::cell::RefCell;
use std::sync::Arc;
use std::thread::JoinHandle;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Duration, with_timeout};
use futures_lite::future::{block_on, or};
use log::{debug, info, warn};

use super::Shared;
use super::events::MeshEvent;
use crate::error::Error;
use crate::mesh::Profile;
use crate::task_pin;

/// Application callback for one profile.
pub type Callback = Arc<dyn Fn(&MeshEvent) + Send + Sync>;

/// Per-profile callback slots, replaceable while the bridge runs.
pub(crate) struct CallbackTable {
    slots: Mutex<CriticalSectionRawMutex, RefCell<[Option<Callback>; Profile::COUNT]>>,
}

impl CallbackTable {
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(RefCell::new([const { None }; Profile::COUNT])),
        }
    }

    pub(crate) fn set(&self, profile: Profile, callback: Option<Callback>) -> Option<Callback> {
        self.slots
            .lock(|slots| core::mem::replace(&mut slots.borrow_mut()[profile.index()], callback))
    }

    /// Cloned out so the callback runs without the lock held.
    pub(crate) fn get(&self, profile: Profile) -> Option<Callback> {
        self.slots
            .lock(|slots| slots.borrow()[profile.index()].clone())
    }
}

impl<const CALLS: usize, const EVENTS: usize> Shared<CALLS, EVENTS> {
    /// Hand one event to its callback, then release it.
    pub(crate) fn deliver(&self, event: MeshEvent) {
        if !self.is_running() {
            return;
        }
        match self.callbacks.get(event.profile) {
            Some(callback) => {
                callback(&event);
                self.counters.delivered();
            }
            None => {
                warn!(
                    "Callback: none registered for {}, releasing {:?}",
                    event.profile, event.kind
                );
                self.counters.unhandled();
            }
        }
        // A slot just freed up for reports held back by a full queue.
        if self.pending.unreported() > 0 {
            self.report_deferred();
        }
    }
}

// ── Event pump ────────────────────────────────────────────────

/// Sole consumer of the application queue.
pub struct EventPump<const CALLS: usize, const EVENTS: usize> {
    shared: Arc<Shared<CALLS, EVENTS>>,
}

impl<const CALLS: usize, const EVENTS: usize> EventPump<CALLS, EVENTS> {
    pub(crate) fn new(shared: Arc<Shared<CALLS, EVENTS>>) -> Self {
        Self { shared }
    }

    /// Deliver everything already queued. Returns the number of events
    /// taken off the queue.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut n = 0;
        while let Ok(event) = self.shared.events.try_receive() {
            self.shared.deliver(event);
            n += 1;
        }
        n
    }

    /// Wait up to `timeout` for one event and deliver it.
    pub fn wait_and_dispatch(&mut self, timeout: Duration) -> bool {
        match block_on(with_timeout(timeout, self.shared.events.receive())) {
            Ok(event) => {
                self.shared.deliver(event);
                true
            }
            Err(_) => false,
        }
    }

    /// Move the pump onto its own worker thread.
    pub fn spawn(self) -> Result<CallbackWorker, Error> {
        let shared = Arc::clone(&self.shared);
        let handle = task_pin::spawn_on_core(&shared.config.app_task, "mesh-app\0", move || {
            info!("Callback: worker running");
            loop {
                let next = block_on(or(
                    async {
                        self.shared.app_stop.wait().await;
                        None
                    },
                    async { Some(self.shared.events.receive().await) },
                ));
                match next {
                    Some(event) => self.shared.deliver(event),
                    None => break,
                }
            }
            debug!("Callback: worker stopped");
        })?;
        Ok(CallbackWorker {
            stop: Box::new(move || shared.app_stop.signal(())),
            handle: Some(handle),
        })
    }
}

/// Handle to a spawned callback worker. Dropping it stops and joins the
/// worker.
pub struct CallbackWorker {
    stop: Box<dyn Fn() + Send>,
    handle: Option<JoinHandle<()>>,
}

impl CallbackWorker {
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        if let Some(handle) = self.handle.take() {
            (self.stop)();
            if handle.join().is_err() {
                warn!("Callback: worker panicked");
            }
        }
    }
}

impl Drop for CallbackWorker {
    fn drop(&mut self) {
        self.halt();
    }
}

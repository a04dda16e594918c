//! Cross-context call/event bridge.
//!
//! Application threads submit actions; a single stack worker executes
//! them and raises events; a single application consumer delivers those
//! events to per-profile callbacks. The pending-request tracker sits
//! between the two flows and turns silence into `Timeout` events.
//!
//! ```text
//!   app threads                 mesh-stack                  app consumer
//!  ┌───────────┐  CallQueue   ┌─────────────┐  EventQueue  ┌────────────┐
//!  │ submit()  │─────────────▶│ executor    │─────────────▶│ EventPump  │
//!  └─────┬─────┘              │  handlers ──┼─ raise() ───▶│  callbacks │
//!        │ insert             └──────┬──────┘              └────────────┘
//!        ▼                           │ take / expire / cancel
//!  ┌──────────────────────────────────▼──┐
//!  │        PendingTracker (deadlines)   │
//!  └─────────────────────────────────────┘
//! ```
//!
//! Lifecycle: `Idle` (constructed, callbacks may be registered) →
//! `Running` (after [`Bridge::start`]) → `Stopped` (after
//! [`Bridge::shutdown`] or drop). Calls and raises outside `Running`
//! fail with `NotInitialized`.

pub mod channels;
pub mod dispatcher;
pub mod events;
pub mod executor;
pub mod invoker;
pub mod pending;
pub mod registry;

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::{info, warn};

use crate::config::BridgeConfig;
use crate::diagnostics::{BridgeMetrics, Counters};
use crate::error::{DispatchError, Error, Result};
use crate::mesh::Profile;
use crate::mesh::actions::Action;
use crate::mesh::types::ConnHandle;
use crate::task_pin;

use channels::{CallQueue, DEFAULT_CALL_DEPTH, DEFAULT_EVENT_DEPTH, EventQueue, TxnId};
use dispatcher::Submitter;
use events::{EventSink, MeshEvent, RaisedEvent};
use executor::StackHandlers;
use invoker::{CallbackTable, EventPump};
use pending::PendingTracker;
use registry::ArgRegistry;

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// State shared by both contexts for the bridge's lifetime.
pub(crate) struct Shared<const CALLS: usize, const EVENTS: usize> {
    config: BridgeConfig,
    lifecycle: AtomicU8,
    registry: ArgRegistry,
    pending: PendingTracker,
    calls: CallQueue<CALLS>,
    events: EventQueue<EVENTS>,
    callbacks: CallbackTable,
    handled: [AtomicBool; Profile::COUNT],
    stop: Signal<CriticalSectionRawMutex, ()>,
    app_stop: Signal<CriticalSectionRawMutex, ()>,
    counters: Counters,
    next_seq: AtomicU32,
    next_txn: AtomicU32,
}

impl<const CALLS: usize, const EVENTS: usize> Shared<CALLS, EVENTS> {
    fn new(config: BridgeConfig) -> Self {
        Self {
            registry: ArgRegistry::new(config.clone_byte_budget),
            config,
            lifecycle: AtomicU8::new(IDLE),
            pending: PendingTracker::new(),
            calls: CallQueue::new(),
            events: EventQueue::new(),
            callbacks: CallbackTable::new(),
            handled: [const { AtomicBool::new(false) }; Profile::COUNT],
            stop: Signal::new(),
            app_stop: Signal::new(),
            counters: Counters::default(),
            next_seq: AtomicU32::new(0),
            next_txn: AtomicU32::new(1),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.lifecycle.load(Ordering::Acquire) == RUNNING
    }

    fn has_handler(&self, profile: Profile) -> bool {
        self.handled[profile.index()].load(Ordering::Acquire)
    }

    fn next_seq(&self) -> u32 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    fn next_txn(&self) -> TxnId {
        TxnId::new(self.next_txn.fetch_add(1, Ordering::Relaxed))
    }

    fn metrics(&self) -> BridgeMetrics {
        BridgeMetrics::collect(
            &self.counters,
            self.pending.len(),
            self.registry.outstanding(),
            self.calls.len(),
            self.events.len(),
        )
    }
}

/// Event sink handle for stack-side code running outside the executor
/// (e.g. a controller thread reporting advertising packets).
pub struct StackSink<const CALLS: usize, const EVENTS: usize> {
    shared: Arc<Shared<CALLS, EVENTS>>,
}

impl<const CALLS: usize, const EVENTS: usize> Clone for StackSink<CALLS, EVENTS> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<const CALLS: usize, const EVENTS: usize> EventSink for StackSink<CALLS, EVENTS> {
    fn raise(&self, event: RaisedEvent<'_>) -> core::result::Result<Option<TxnId>, DispatchError> {
        self.shared.raise(event)
    }
}

// ── Bridge ────────────────────────────────────────────────────

/// The call/event bridge. Queue depths are fixed at compile time.
pub struct Bridge<const CALLS: usize = DEFAULT_CALL_DEPTH, const EVENTS: usize = DEFAULT_EVENT_DEPTH>
{
    shared: Arc<Shared<CALLS, EVENTS>>,
    pump: Option<EventPump<CALLS, EVENTS>>,
    stack_worker: Option<JoinHandle<()>>,
}

impl Bridge {
    /// Bridge with the default queue depths.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        Self::with_queues(config)
    }
}

impl<const CALLS: usize, const EVENTS: usize> Bridge<CALLS, EVENTS> {
    pub fn with_queues(config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        let shared = Arc::new(Shared::new(config));
        Ok(Self {
            pump: Some(EventPump::new(Arc::clone(&shared))),
            shared,
            stack_worker: None,
        })
    }

    /// Spawn the stack worker with `handlers` and start accepting calls.
    pub fn start(&mut self, handlers: StackHandlers) -> Result<()> {
        if self.shared.lifecycle.load(Ordering::Acquire) != IDLE {
            return Err(Error::AlreadyStarted);
        }
        for profile in Profile::ALL {
            self.shared.handled[profile.index()].store(handlers.contains(profile), Ordering::Release);
        }

        let shared = Arc::clone(&self.shared);
        let handle = task_pin::spawn_on_core(&self.shared.config.stack_task, "mesh-stack\0", move || {
            shared.run_executor(handlers);
        })?;
        self.stack_worker = Some(handle);
        self.shared.lifecycle.store(RUNNING, Ordering::Release);
        info!(
            "Bridge: running (calls={}, events={}, policy={:?})",
            CALLS, EVENTS, self.shared.config.queue_full_policy
        );
        Ok(())
    }

    pub fn submit(
        &self,
        action: &Action,
    ) -> core::result::Result<Option<TxnId>, DispatchError> {
        self.shared.submit(action)
    }

    pub fn submitter(&self) -> Submitter<CALLS, EVENTS> {
        Submitter::new(Arc::clone(&self.shared))
    }

    pub fn event_sink(&self) -> StackSink<CALLS, EVENTS> {
        StackSink {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Install (or replace) the callback for `profile`.
    pub fn register_callback(
        &self,
        profile: Profile,
        callback: impl Fn(&MeshEvent) + Send + Sync + 'static,
    ) {
        self.shared.callbacks.set(profile, Some(Arc::new(callback)));
    }

    pub fn unregister_callback(&self, profile: Profile) {
        self.shared.callbacks.set(profile, None);
    }

    /// The single consumer of the event queue. `None` once taken.
    pub fn take_event_pump(&mut self) -> Option<EventPump<CALLS, EVENTS>> {
        self.pump.take()
    }

    /// Cancel every pending request over connection `conn`.
    pub fn cancel_owner(&self, conn: ConnHandle) -> usize {
        self.shared.cancel_owner(conn)
    }

    pub fn pending_count(&self) -> usize {
        self.shared.pending.len()
    }

    pub fn registry(&self) -> &ArgRegistry {
        &self.shared.registry
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    pub fn metrics(&self) -> BridgeMetrics {
        self.shared.metrics()
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Stop both workers, cancel every pending request and release
    /// everything still queued. No callback runs afterwards.
    pub fn shutdown(&mut self) {
        if self.shared.lifecycle.swap(STOPPED, Ordering::AcqRel) != RUNNING {
            return;
        }
        self.shared.stop.signal(());
        self.shared.app_stop.signal(());
        if let Some(handle) = self.stack_worker.take() {
            if handle.join().is_err() {
                warn!("Bridge: stack worker panicked");
            }
        }

        let cancelled = self.shared.pending.cancel_all();
        let mut released = 0;
        while self.shared.calls.try_receive().is_ok() {
            released += 1;
        }
        while self.shared.events.try_receive().is_ok() {
            released += 1;
        }
        info!(
            "Bridge: stopped ({} pending cancelled, {} queued entries released)",
            cancelled, released
        );
    }
}

impl<const CALLS: usize, const EVENTS: usize> Drop for Bridge<CALLS, EVENTS> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

//! Runtime diagnostics.
//!
//! Lock-free counters bumped from both contexts, and an on-demand
//! [`BridgeMetrics`] snapshot for logging or a status endpoint.

use core::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct Counters {
    submitted: AtomicU32,
    rejected: AtomicU32,
    executed: AtomicU32,
    raised: AtomicU32,
    events_dropped: AtomicU32,
    stale_responses: AtomicU32,
    timeouts: AtomicU32,
    cancellations: AtomicU32,
    delivered: AtomicU32,
    unhandled: AtomicU32,
}

macro_rules! bump {
    ($($name:ident => $field:ident),* $(,)?) => {
        $(
            pub fn $name(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl Counters {
    bump! {
        submitted => submitted,
        rejected => rejected,
        executed => executed,
        raised => raised,
        event_dropped => events_dropped,
        stale => stale_responses,
        timed_out => timeouts,
        cancelled => cancellations,
        delivered => delivered,
        unhandled => unhandled,
    }
}

/// Diagnostics snapshot collected on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeMetrics {
    /// Calls accepted onto the call queue.
    pub calls_submitted: u32,
    /// Calls refused after validation (queue full, busy, copy failure).
    pub calls_rejected: u32,
    pub calls_executed: u32,
    pub events_raised: u32,
    /// Events lost to a full application queue.
    pub events_dropped: u32,
    pub stale_responses: u32,
    pub timeouts: u32,
    pub cancellations: u32,
    pub callbacks_invoked: u32,
    /// Events released without a registered callback.
    pub callbacks_missing: u32,
    pub pending_requests: u32,
    pub outstanding_copies: u32,
    pub call_queue_len: u32,
    pub event_queue_len: u32,
    pub heap_free: u32,
}

impl BridgeMetrics {
    pub(crate) fn collect(
        counters: &Counters,
        pending_requests: usize,
        outstanding_copies: usize,
        call_queue_len: usize,
        event_queue_len: usize,
    ) -> Self {
        let load = |c: &AtomicU32| c.load(Ordering::Relaxed);
        Self {
            calls_submitted: load(&counters.submitted),
            calls_rejected: load(&counters.rejected),
            calls_executed: load(&counters.executed),
            events_raised: load(&counters.raised),
            events_dropped: load(&counters.events_dropped),
            stale_responses: load(&counters.stale_responses),
            timeouts: load(&counters.timeouts),
            cancellations: load(&counters.cancellations),
            callbacks_invoked: load(&counters.delivered),
            callbacks_missing: load(&counters.unhandled),
            pending_requests: pending_requests as u32,
            outstanding_copies: outstanding_copies as u32,
            call_queue_len: call_queue_len as u32,
            event_queue_len: event_queue_len as u32,
            heap_free: heap_free(),
        }
    }
}

#[cfg(target_os = "espidf")]
fn heap_free() -> u32 {
    // SAFETY: plain allocator statistics read.
    unsafe { esp_idf_sys::esp_get_free_heap_size() }
}

#[cfg(not(target_os = "espidf"))]
fn heap_free() -> u32 {
    0
}

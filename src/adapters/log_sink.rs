//! Log-based callback adapter.
//!
//! Writes every delivered [`MeshEvent`] to the `log` facade (UART /
//! USB-CDC on target, `env_logger` on host). Useful as a catch-all so
//! unhandled profiles still leave a trace.

use log::{info, warn};

use crate::bridge::Bridge;
use crate::bridge::events::MeshEvent;
use crate::mesh::Profile;
use crate::mesh::events::EventKind;

/// Callback that logs one event.
pub fn log_event(event: &MeshEvent) {
    let txn = event
        .txn()
        .map_or_else(|| "-".to_owned(), |t| t.to_string());
    match event.kind {
        EventKind::Timeout => warn!(
            "TIMEOUT | {} | opcode=0x{:04X} | dst=0x{:04X} | txn={}",
            event.profile, event.opcode, event.ctx.addr, txn
        ),
        EventKind::Cancelled => warn!(
            "CANCEL | {} | opcode=0x{:04X} | bearer={:?} | txn={}",
            event.profile, event.opcode, event.ctx.bearer, txn
        ),
        kind => info!(
            "EVENT | {} | {:?} | opcode=0x{:04X} | src=0x{:04X} | txn={} | len={}",
            event.profile,
            kind,
            event.opcode,
            event.ctx.addr,
            txn,
            event.payload().len()
        ),
    }
}

/// Register [`log_event`] for every profile, replacing existing
/// registrations.
pub fn install<const CALLS: usize, const EVENTS: usize>(bridge: &Bridge<CALLS, EVENTS>) {
    for profile in Profile::ALL {
        bridge.register_callback(profile, log_event);
    }
}

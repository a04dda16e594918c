//! Event kinds raised from the stack context.
//!
//! Client profiles answer requests (`GetState`, `SetState`) or relay
//! unsolicited publications (`Publish`). Server profiles report state
//! changes and received messages. `Timeout` and `Cancelled` are
//! synthesised by the bridge itself and can never be raised by a stack
//! handler.

use serde::{Deserialize, Serialize};

use super::Profile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventKind {
    // ── Client responses ──────────────────────────────────────
    /// Status answering a get request.
    GetState = 0,
    /// Status answering a set request.
    SetState = 1,
    /// Unsolicited status (publication or late status).
    Publish = 2,

    // ── Synthetic (bridge-generated) ──────────────────────────
    /// A pending request's deadline elapsed with no response.
    Timeout = 3,
    /// A pending request was purged because its connection went away.
    Cancelled = 4,

    // ── Server side ───────────────────────────────────────────
    StateChange = 5,
    RecvGet = 6,
    RecvSet = 7,
    RecvStatus = 8,

    // ── Model layer ───────────────────────────────────────────
    /// Incoming access message for a local model.
    Operation = 9,
    /// An asynchronous stack operation finished.
    Complete = 10,

    // ── Proxy client ──────────────────────────────────────────
    AdvPacket = 11,
    Connected = 12,
    Disconnected = 13,
    FilterStatus = 14,
}

impl EventKind {
    /// Generated by the bridge, never by a stack handler.
    pub const fn is_synthetic(self) -> bool {
        matches!(self, Self::Timeout | Self::Cancelled)
    }

    /// May answer a pending request and is matched against the tracker.
    pub const fn is_response(self) -> bool {
        matches!(
            self,
            Self::GetState | Self::SetState | Self::FilterStatus | Self::Operation
        )
    }

    /// Must answer a pending request; unmatched ones are stale.
    pub const fn requires_request(self) -> bool {
        matches!(self, Self::GetState | Self::SetState | Self::FilterStatus)
    }
}

impl Profile {
    /// Whether a stack handler for this profile may raise `kind`.
    pub fn produces(self, kind: EventKind) -> bool {
        use EventKind as K;
        if kind.is_synthetic() {
            return false;
        }
        match self {
            Self::ConfigClient | Self::HealthClient | Self::TimeSceneClient => {
                matches!(kind, K::GetState | K::SetState | K::Publish)
            }
            Self::ConfigServer => matches!(kind, K::StateChange),
            Self::HealthServer => matches!(kind, K::StateChange | K::Complete),
            Self::TimeSceneServer => matches!(
                kind,
                K::StateChange | K::RecvGet | K::RecvSet | K::RecvStatus
            ),
            Self::ProxyClient => matches!(
                kind,
                K::AdvPacket | K::Connected | K::Disconnected | K::FilterStatus | K::Complete
            ),
            Self::Model => matches!(kind, K::Operation | K::Complete | K::Publish),
        }
    }
}

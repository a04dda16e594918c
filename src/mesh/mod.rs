//! Mesh-facing data model handed to the bridge by the API layer.
//!
//! The bridge is agnostic to what an action or event *does*; it only
//! needs a closed set of variants so that deep copy, validation and
//! request/response correlation can be checked exhaustively.
//!
//! ```text
//!   Profile ──┬── Action (app → stack)   actions.rs
//!             └── EventKind (stack → app) events.rs
//!   ClientParams / MsgCtx                 types.rs
//!   request → status opcode pairs         opcodes.rs
//!   typed status payloads                 status.rs
//! ```

pub mod actions;
pub mod events;
pub mod opcodes;
pub mod status;
pub mod types;

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// Profile identifier: the unit of stack-handler and callback
/// registration. Discriminants are the raw profile tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Profile {
    ConfigClient = 0,
    ConfigServer = 1,
    HealthClient = 2,
    HealthServer = 3,
    TimeSceneClient = 4,
    TimeSceneServer = 5,
    ProxyClient = 6,
    Model = 7,
}

impl Profile {
    /// Total number of profiles, used to size per-profile tables.
    pub const COUNT: usize = 8;

    pub const ALL: [Profile; Self::COUNT] = [
        Self::ConfigClient,
        Self::ConfigServer,
        Self::HealthClient,
        Self::HealthServer,
        Self::TimeSceneClient,
        Self::TimeSceneServer,
        Self::ProxyClient,
        Self::Model,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::ConfigClient => "config-client",
            Self::ConfigServer => "config-server",
            Self::HealthClient => "health-client",
            Self::HealthServer => "health-server",
            Self::TimeSceneClient => "time-scene-client",
            Self::TimeSceneServer => "time-scene-server",
            Self::ProxyClient => "proxy-client",
            Self::Model => "model",
        }
    }
}

impl TryFrom<u8> for Profile {
    type Error = DispatchError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(raw as usize)
            .copied()
            .ok_or(DispatchError::UnknownActionType)
    }
}

impl core::fmt::Display for Profile {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

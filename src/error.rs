//! Unified error types for the mesh bridge.
//!
//! `DispatchError` is what `submit` and `raise` hand back to their callers.
//! It is `Copy` so it can be returned from either context without
//! allocation. Configuration problems and worker start-up failures funnel
//! into the top-level [`Error`].

use core::fmt;

use crate::bridge::registry::AllocError;

// ---------------------------------------------------------------------------
// Dispatch errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// The bridge is not running (never started, or already shut down).
    NotInitialized,
    /// The destination queue is saturated.
    QueueFull,
    /// Deep copy of the arguments could not allocate.
    AllocationFailed,
    /// The arguments can never be executed as given.
    InvalidArgument(&'static str),
    /// No stack handler is registered for the action's profile.
    UnknownActionType,
    /// The profile cannot raise this event kind.
    UnknownEventType,
    /// An identical request to the same peer is still outstanding.
    Busy,
    /// The pending-request table has no free slot.
    PendingFull,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "bridge not initialized"),
            Self::QueueFull => write!(f, "queue full"),
            Self::AllocationFailed => write!(f, "argument copy allocation failed"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::UnknownActionType => write!(f, "unknown action type"),
            Self::UnknownEventType => write!(f, "unknown event type"),
            Self::Busy => write!(f, "request already pending"),
            Self::PendingFull => write!(f, "pending-request table full"),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<AllocError> for DispatchError {
    fn from(_: AllocError) -> Self {
        Self::AllocationFailed
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A field is outside its accepted range.
    Invalid(&'static str),
    /// The JSON document could not be parsed.
    Parse,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
            Self::Parse => write!(f, "config parse error"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<serde_json::Error> for ConfigError {
    fn from(_: serde_json::Error) -> Self {
        Self::Parse
    }
}

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible bridge operation outside the hot path funnels into this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Dispatch(DispatchError),
    Config(ConfigError),
    /// A worker thread could not be created.
    Spawn(&'static str),
    /// `start` was called on a bridge that already ran.
    AlreadyStarted,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dispatch(e) => write!(f, "dispatch: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Spawn(name) => write!(f, "spawn: could not start {name}"),
            Self::AlreadyStarted => write!(f, "bridge already started"),
        }
    }
}

impl std::error::Error for Error {}

impl From<DispatchError> for Error {
    fn from(e: DispatchError) -> Self {
        Self::Dispatch(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

//! BLE Mesh call/event bridge library.
//!
//! Hands application calls to the mesh stack context and stack events
//! back to application callbacks, with deep-copied arguments, request
//! tracking and synthetic timeouts. All ESP-IDF-specific code is guarded
//! by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod bridge;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod mesh;
pub mod task_pin;

pub use bridge::Bridge;
pub use bridge::channels::{Envelope, TxnId};
pub use bridge::events::{EventSink, MeshEvent, RaisedEvent};
pub use bridge::executor::StackHandlers;
pub use config::{BridgeConfig, QueueFullPolicy};
pub use error::{DispatchError, Error, Result};
pub use mesh::Profile;
pub use mesh::actions::Action;
pub use mesh::events::EventKind;

//! Typed status payloads.
//!
//! Stack handlers encode these with `postcard` before raising an event;
//! callbacks decode them with
//! [`MeshEvent::decode`](crate::bridge::events::MeshEvent::decode).
//! The bridge itself only ever sees the encoded bytes.

use serde::{Deserialize, Serialize};

/// Proxy server filter status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStatus {
    pub filter_type: u8,
    pub list_size: u16,
}

/// Health fault status (current or registered fault array).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultStatus {
    pub test_id: u8,
    pub company_id: u16,
    pub faults: heapless::Vec<u8, 32>,
}

/// Single-byte configuration states (beacon, default TTL, GATT proxy, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteState {
    pub value: u8,
}

/// Server-side notification that a local state changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub opcode: u32,
    pub value: u32,
}

/// Encode `status` into a freshly allocated payload buffer.
pub fn encode<T: Serialize>(status: &T) -> Result<Vec<u8>, postcard::Error> {
    postcard::to_allocvec(status)
}

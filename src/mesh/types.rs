//! Addressing and client-parameter types shared by actions and events.
//!
//! These mirror the parameter blocks the mesh API layer fills in before
//! handing a call to the bridge. The bridge only inspects them for
//! validation and request/response correlation; what the fields mean on
//! the air is the stack's business.

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// Key index value meaning "no key selected".
pub const KEY_UNUSED: u16 = 0xFFFF;

/// The unassigned unicast address.
pub const ADDR_UNASSIGNED: u16 = 0x0000;

/// Handle of a GATT proxy connection (assigned by the stack).
pub type ConnHandle = u8;

/// Identifies a model instance on the local node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelHandle {
    /// Element index within the local composition.
    pub element: u8,
    /// Model index within that element.
    pub model: u8,
}

impl ModelHandle {
    pub const fn new(element: u8, model: u8) -> Self {
        Self { element, model }
    }
}

/// How a message reaches (or arrived from) its peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bearer {
    /// Advertising bearer (no connection to track).
    Adv,
    /// Routed over a GATT proxy connection.
    Gatt(ConnHandle),
}

impl Bearer {
    /// The proxy connection this bearer depends on, if any.
    pub fn connection(self) -> Option<ConnHandle> {
        match self {
            Self::Adv => None,
            Self::Gatt(handle) => Some(handle),
        }
    }
}

/// Message context: keys and addressing for one mesh message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCtx {
    pub net_idx: u16,
    pub app_idx: u16,
    /// Remote address (destination when sending, source when receiving).
    pub addr: u16,
    /// Destination the message was received on.
    pub recv_dst: u16,
    pub send_ttl: u8,
    pub bearer: Bearer,
}

impl MsgCtx {
    /// Context for a message to `addr` over the advertising bearer.
    pub const fn new(net_idx: u16, app_idx: u16, addr: u16) -> Self {
        Self {
            net_idx,
            app_idx,
            addr,
            recv_dst: ADDR_UNASSIGNED,
            send_ttl: 0xFF,
            bearer: Bearer::Adv,
        }
    }

    /// Same context routed over a proxy connection.
    pub const fn via(mut self, bearer: Bearer) -> Self {
        self.bearer = bearer;
        self
    }
}

impl Default for MsgCtx {
    fn default() -> Self {
        Self::new(KEY_UNUSED, KEY_UNUSED, ADDR_UNASSIGNED)
    }
}

/// Common parameter block of every client-model request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientParams {
    /// Request opcode.
    pub opcode: u32,
    /// Local client model sending the request.
    pub model: ModelHandle,
    pub ctx: MsgCtx,
    /// Response timeout in ms; `0` selects the bridge default.
    pub msg_timeout_ms: u32,
}

impl ClientParams {
    pub const fn new(opcode: u32, model: ModelHandle, ctx: MsgCtx) -> Self {
        Self {
            opcode,
            model,
            ctx,
            msg_timeout_ms: 0,
        }
    }

    pub const fn with_timeout(mut self, msg_timeout_ms: u32) -> Self {
        self.msg_timeout_ms = msg_timeout_ms;
        self
    }

    /// Reject parameter blocks the stack could never send.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.ctx.net_idx == KEY_UNUSED {
            return Err(DispatchError::InvalidArgument("net_idx unused"));
        }
        if self.ctx.app_idx == KEY_UNUSED {
            return Err(DispatchError::InvalidArgument("app_idx unused"));
        }
        if self.ctx.addr == ADDR_UNASSIGNED {
            return Err(DispatchError::InvalidArgument("destination unassigned"));
        }
        Ok(())
    }
}

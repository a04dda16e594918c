//! Actions: application-initiated calls executed on the stack context.
//!
//! Fixed-size argument blocks are `Copy`. Variants that embed
//! variable-length buffers (proxy filter address lists, model message
//! bodies) are only ever duplicated through [`DeepCopy`], which sizes the
//! new buffers exactly and charges them to the copy budget.

use crate::bridge::registry::{AllocError, CopyBudget, DeepCopy};
use crate::error::DispatchError;

use super::Profile;
use super::opcodes::{self, PROXY_ADD_ADDR, PROXY_REMOVE_ADDR, PROXY_SET_FILTER_TYPE};
use super::types::{ClientParams, ConnHandle, KEY_UNUSED, ModelHandle, MsgCtx};

/// Largest access payload a single model message may carry.
pub const MAX_ACCESS_PAYLOAD: usize = 380;

/// Largest proxy filter address list accepted in one call.
pub const MAX_FILTER_ADDRS: usize = 64;

// ───────────────────────────────────────────────────────────────
// Configuration client
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigClientCall {
    GetState {
        params: ClientParams,
        get: ConfigGetState,
    },
    SetState {
        params: ClientParams,
        set: ConfigSetState,
    },
}

/// Arguments of a configuration get; most gets carry none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigGetState {
    NoArgs,
    CompositionData { page: u8 },
    SigModelSub { element_addr: u16, model_id: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSetState {
    Beacon { beacon: u8 },
    DefaultTtl { ttl: u8 },
    GattProxy { gatt_proxy: u8 },
    AppKeyAdd {
        net_idx: u16,
        app_idx: u16,
        app_key: [u8; 16],
    },
    ModelSubAdd {
        element_addr: u16,
        sub_addr: u16,
        model_id: u16,
        company_id: Option<u16>,
    },
    ModelSubDelete {
        element_addr: u16,
        sub_addr: u16,
        model_id: u16,
        company_id: Option<u16>,
    },
    NodeReset,
}

// ───────────────────────────────────────────────────────────────
// Health client / server
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthClientCall {
    GetState {
        params: ClientParams,
        get: HealthGetState,
    },
    SetState {
        params: ClientParams,
        set: HealthSetState,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthGetState {
    NoArgs,
    FaultGet { company_id: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthSetState {
    Attention { attention: u8 },
    Period { fast_period_divisor: u8 },
    FaultTest { test_id: u8, company_id: u16 },
    FaultClear { company_id: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthServerCall {
    /// Re-publish the current fault state of an element.
    FaultUpdate { element_addr: u16 },
}

// ───────────────────────────────────────────────────────────────
// Time and scene client
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSceneClientCall {
    GetState {
        params: ClientParams,
        get: TimeSceneGetState,
    },
    SetState {
        params: ClientParams,
        set: TimeSceneSetState,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSceneGetState {
    NoArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSceneSetState {
    Time {
        tai_seconds: u64,
        subsecond: u8,
        uncertainty: u8,
        tai_utc_delta: u16,
        time_zone_offset: u8,
    },
    SceneStore { scene_number: u16 },
    SceneRecall {
        scene_number: u16,
        tid: u8,
        /// `(transition_time, delay)` when a transition is requested.
        transition: Option<(u8, u8)>,
    },
}

// ───────────────────────────────────────────────────────────────
// Proxy client
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FilterType {
    Accept = 0,
    Reject = 1,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ProxyClientCall {
    Connect {
        addr: [u8; 6],
        addr_type: u8,
        net_idx: u16,
    },
    Disconnect {
        conn_handle: ConnHandle,
    },
    SetFilterType {
        conn_handle: ConnHandle,
        net_idx: u16,
        filter_type: FilterType,
    },
    AddFilterAddr {
        conn_handle: ConnHandle,
        net_idx: u16,
        addrs: Vec<u16>,
    },
    RemoveFilterAddr {
        conn_handle: ConnHandle,
        net_idx: u16,
        addrs: Vec<u16>,
    },
}

// ───────────────────────────────────────────────────────────────
// Generic model messaging
// ───────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
pub enum ModelCall {
    /// Client model message; `response` names the status opcode to await.
    ClientSend {
        params: ClientParams,
        data: Vec<u8>,
        response: Option<u32>,
    },
    /// Server model reply to a received message.
    ServerSend {
        model: ModelHandle,
        ctx: MsgCtx,
        opcode: u32,
        data: Vec<u8>,
    },
    /// Publish through the model's publication settings.
    Publish {
        model: ModelHandle,
        opcode: u32,
        data: Vec<u8>,
    },
}

// ───────────────────────────────────────────────────────────────
// Action
// ───────────────────────────────────────────────────────────────

/// Every call the application can hand to the stack context.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    ConfigClient(ConfigClientCall),
    HealthClient(HealthClientCall),
    HealthServer(HealthServerCall),
    TimeSceneClient(TimeSceneClientCall),
    ProxyClient(ProxyClientCall),
    Model(ModelCall),
}

/// Who a pending request expects its answer from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peer {
    /// A mesh node, by unicast (or group) address.
    Node(u16),
    /// The proxy server at the far end of a GATT connection.
    Proxy(ConnHandle),
}

/// Response shape of a request-expecting action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expectation {
    pub request_opcode: u32,
    pub expected_opcode: u32,
    pub peer: Peer,
    /// Connection whose loss cancels the request.
    pub owner: Option<ConnHandle>,
    pub model: Option<ModelHandle>,
    /// Client parameters echoed back with the response or timeout.
    pub params: Option<ClientParams>,
    /// Requested timeout in ms; `0` selects the configured default.
    pub timeout_ms: u32,
}

impl Action {
    pub fn profile(&self) -> Profile {
        match self {
            Self::ConfigClient(_) => Profile::ConfigClient,
            Self::HealthClient(_) => Profile::HealthClient,
            Self::HealthServer(_) => Profile::HealthServer,
            Self::TimeSceneClient(_) => Profile::TimeSceneClient,
            Self::ProxyClient(_) => Profile::ProxyClient,
            Self::Model(_) => Profile::Model,
        }
    }

    /// Request opcode carried by the action, where it has one.
    pub fn opcode(&self) -> Option<u32> {
        match self {
            Self::ConfigClient(
                ConfigClientCall::GetState { params, .. } | ConfigClientCall::SetState { params, .. },
            )
            | Self::HealthClient(
                HealthClientCall::GetState { params, .. } | HealthClientCall::SetState { params, .. },
            )
            | Self::TimeSceneClient(
                TimeSceneClientCall::GetState { params, .. }
                | TimeSceneClientCall::SetState { params, .. },
            )
            | Self::Model(ModelCall::ClientSend { params, .. }) => Some(params.opcode),
            Self::Model(ModelCall::ServerSend { opcode, .. } | ModelCall::Publish { opcode, .. }) => {
                Some(*opcode)
            }
            Self::ProxyClient(ProxyClientCall::SetFilterType { .. }) => Some(PROXY_SET_FILTER_TYPE),
            Self::ProxyClient(ProxyClientCall::AddFilterAddr { .. }) => Some(PROXY_ADD_ADDR),
            Self::ProxyClient(ProxyClientCall::RemoveFilterAddr { .. }) => Some(PROXY_REMOVE_ADDR),
            Self::ProxyClient(ProxyClientCall::Connect { .. } | ProxyClientCall::Disconnect { .. })
            | Self::HealthServer(_) => None,
        }
    }

    /// Argument checks performed before anything is copied or queued.
    pub fn validate(&self) -> Result<(), DispatchError> {
        match self {
            Self::ConfigClient(
                ConfigClientCall::GetState { params, .. } | ConfigClientCall::SetState { params, .. },
            )
            | Self::TimeSceneClient(
                TimeSceneClientCall::GetState { params, .. }
                | TimeSceneClientCall::SetState { params, .. },
            )
            | Self::HealthClient(HealthClientCall::SetState { params, .. }) => params.validate(),
            Self::HealthClient(HealthClientCall::GetState { params, get }) => {
                params.validate()?;
                if params.opcode == opcodes::HEALTH_FAULT_GET
                    && *get == HealthGetState::NoArgs
                {
                    return Err(DispatchError::InvalidArgument(
                        "fault get requires a company id",
                    ));
                }
                Ok(())
            }
            Self::HealthServer(HealthServerCall::FaultUpdate { .. }) => Ok(()),
            Self::ProxyClient(call) => call.validate(),
            Self::Model(call) => call.validate(),
        }
    }

    /// The response this action waits for, or `None` when it completes
    /// without one (unacknowledged messages, connection management).
    pub fn expectation(&self) -> Option<Expectation> {
        match self {
            Self::ConfigClient(
                ConfigClientCall::GetState { params, .. } | ConfigClientCall::SetState { params, .. },
            ) => client_expectation(Profile::ConfigClient, params),
            Self::HealthClient(
                HealthClientCall::GetState { params, .. } | HealthClientCall::SetState { params, .. },
            ) => client_expectation(Profile::HealthClient, params),
            Self::TimeSceneClient(
                TimeSceneClientCall::GetState { params, .. }
                | TimeSceneClientCall::SetState { params, .. },
            ) => client_expectation(Profile::TimeSceneClient, params),
            Self::ProxyClient(
                ProxyClientCall::SetFilterType { conn_handle, .. }
                | ProxyClientCall::AddFilterAddr { conn_handle, .. }
                | ProxyClientCall::RemoveFilterAddr { conn_handle, .. },
            ) => {
                let request = self.opcode()?;
                Some(Expectation {
                    request_opcode: request,
                    expected_opcode: opcodes::status_opcode(Profile::ProxyClient, request)?,
                    peer: Peer::Proxy(*conn_handle),
                    owner: Some(*conn_handle),
                    model: None,
                    params: None,
                    timeout_ms: 0,
                })
            }
            Self::Model(ModelCall::ClientSend {
                params,
                response: Some(expected),
                ..
            }) => Some(Expectation {
                request_opcode: params.opcode,
                expected_opcode: *expected,
                peer: Peer::Node(params.ctx.addr),
                owner: params.ctx.bearer.connection(),
                model: Some(params.model),
                params: Some(*params),
                timeout_ms: params.msg_timeout_ms,
            }),
            _ => None,
        }
    }
}

fn client_expectation(profile: Profile, params: &ClientParams) -> Option<Expectation> {
    let expected_opcode = opcodes::status_opcode(profile, params.opcode)?;
    Some(Expectation {
        request_opcode: params.opcode,
        expected_opcode,
        peer: Peer::Node(params.ctx.addr),
        owner: params.ctx.bearer.connection(),
        model: Some(params.model),
        params: Some(*params),
        timeout_ms: params.msg_timeout_ms,
    })
}

impl ProxyClientCall {
    fn validate(&self) -> Result<(), DispatchError> {
        match self {
            Self::Connect { net_idx, .. } | Self::SetFilterType { net_idx, .. } => {
                if *net_idx == KEY_UNUSED {
                    return Err(DispatchError::InvalidArgument("net_idx unused"));
                }
                Ok(())
            }
            Self::Disconnect { .. } => Ok(()),
            Self::AddFilterAddr { net_idx, addrs, .. }
            | Self::RemoveFilterAddr { net_idx, addrs, .. } => {
                if *net_idx == KEY_UNUSED {
                    return Err(DispatchError::InvalidArgument("net_idx unused"));
                }
                if addrs.is_empty() {
                    return Err(DispatchError::InvalidArgument("empty filter address list"));
                }
                if addrs.len() > MAX_FILTER_ADDRS {
                    return Err(DispatchError::InvalidArgument("filter address list too long"));
                }
                Ok(())
            }
        }
    }
}

impl ModelCall {
    fn validate(&self) -> Result<(), DispatchError> {
        let data = match self {
            Self::ClientSend { params, data, .. } => {
                params.validate()?;
                data
            }
            Self::ServerSend { ctx, data, .. } => {
                if ctx.net_idx == KEY_UNUSED || ctx.app_idx == KEY_UNUSED {
                    return Err(DispatchError::InvalidArgument("key index unused"));
                }
                data
            }
            Self::Publish { data, .. } => data,
        };
        if data.len() > MAX_ACCESS_PAYLOAD {
            return Err(DispatchError::InvalidArgument("access payload too long"));
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Deep copy
// ───────────────────────────────────────────────────────────────

impl DeepCopy for Action {
    fn deep_copy(&self, budget: &mut CopyBudget) -> Result<Self, AllocError> {
        Ok(match self {
            Self::ConfigClient(call) => Self::ConfigClient(*call),
            Self::HealthClient(call) => Self::HealthClient(*call),
            Self::HealthServer(call) => Self::HealthServer(*call),
            Self::TimeSceneClient(call) => Self::TimeSceneClient(*call),
            Self::ProxyClient(call) => Self::ProxyClient(call.deep_copy(budget)?),
            Self::Model(call) => Self::Model(call.deep_copy(budget)?),
        })
    }
}

impl DeepCopy for ProxyClientCall {
    fn deep_copy(&self, budget: &mut CopyBudget) -> Result<Self, AllocError> {
        Ok(match self {
            Self::Connect {
                addr,
                addr_type,
                net_idx,
            } => Self::Connect {
                addr: *addr,
                addr_type: *addr_type,
                net_idx: *net_idx,
            },
            Self::Disconnect { conn_handle } => Self::Disconnect {
                conn_handle: *conn_handle,
            },
            Self::SetFilterType {
                conn_handle,
                net_idx,
                filter_type,
            } => Self::SetFilterType {
                conn_handle: *conn_handle,
                net_idx: *net_idx,
                filter_type: *filter_type,
            },
            Self::AddFilterAddr {
                conn_handle,
                net_idx,
                addrs,
            } => Self::AddFilterAddr {
                conn_handle: *conn_handle,
                net_idx: *net_idx,
                addrs: budget.copy_slice(addrs)?,
            },
            Self::RemoveFilterAddr {
                conn_handle,
                net_idx,
                addrs,
            } => Self::RemoveFilterAddr {
                conn_handle: *conn_handle,
                net_idx: *net_idx,
                addrs: budget.copy_slice(addrs)?,
            },
        })
    }
}

impl DeepCopy for ModelCall {
    fn deep_copy(&self, budget: &mut CopyBudget) -> Result<Self, AllocError> {
        Ok(match self {
            Self::ClientSend {
                params,
                data,
                response,
            } => Self::ClientSend {
                params: *params,
                data: budget.copy_slice(data)?,
                response: *response,
            },
            Self::ServerSend {
                model,
                ctx,
                opcode,
                data,
            } => Self::ServerSend {
                model: *model,
                ctx: *ctx,
                opcode: *opcode,
                data: budget.copy_slice(data)?,
            },
            Self::Publish {
                model,
                opcode,
                data,
            } => Self::Publish {
                model: *model,
                opcode: *opcode,
                data: budget.copy_slice(data)?,
            },
        })
    }
}

//! Loopback stack adapter.
//!
//! Stack handlers that answer every acknowledged request locally, as if
//! the addressed node replied at once. Used by the host simulation and
//! by integration tests. Opcodes listed in
//! [`LoopbackConfig::silent`] are swallowed so that the timeout path
//! can be driven on demand.

use log::{debug, warn};
use serde::Serialize;

use crate::bridge::channels::Envelope;
use crate::bridge::events::{EventSink, RaisedEvent};
use crate::bridge::executor::StackHandlers;
use crate::mesh::Profile;
use crate::mesh::actions::{
    Action, ConfigClientCall, ConfigSetState, HealthClientCall, HealthGetState, HealthServerCall,
    ModelCall, ProxyClientCall, TimeSceneClientCall, TimeSceneSetState,
};
use crate::mesh::events::EventKind;
use crate::mesh::opcodes;
use crate::mesh::status::{self, ByteState, FaultStatus, FilterStatus};
use crate::mesh::types::{Bearer, ClientParams, ConnHandle, MsgCtx};

/// Most simultaneous proxy connections the loopback keeps state for.
const MAX_CONNECTIONS: usize = 8;

#[derive(Debug, Clone, Default)]
pub struct LoopbackConfig {
    /// Request opcodes that never get an answer.
    pub silent: heapless::Vec<u32, 8>,
}

impl LoopbackConfig {
    fn answers(&self, opcode: u32) -> bool {
        !self.silent.contains(&opcode)
    }
}

/// Build handlers for every client/server profile the loopback knows.
pub fn handlers(config: &LoopbackConfig) -> StackHandlers {
    let cfg = config.clone();
    let health = config.clone();
    let scene = config.clone();
    let model = config.clone();
    let mut proxy = ProxyState::default();

    StackHandlers::new()
        .with(Profile::ConfigClient, move |env, sink| {
            config_client(&cfg, env, sink);
        })
        .with(Profile::HealthClient, move |env, sink| {
            health_client(&health, env, sink);
        })
        .with(Profile::HealthServer, |env, sink| {
            if let Action::HealthServer(HealthServerCall::FaultUpdate { element_addr }) = &*env.action {
                debug!("Loopback: fault update for element 0x{:04X}", element_addr);
                raise(
                    sink,
                    RaisedEvent::new(Profile::HealthServer, EventKind::Complete, opcodes::HEALTH_FAULT_STATUS),
                );
            }
        })
        .with(Profile::TimeSceneClient, move |env, sink| {
            time_scene_client(&scene, env, sink);
        })
        .with(Profile::ProxyClient, move |env, sink| {
            proxy.handle(env, sink);
        })
        .with(Profile::Model, move |env, sink| {
            model_call(&model, env, sink);
        })
}

fn raise(sink: &dyn EventSink, event: RaisedEvent<'_>) {
    if let Err(e) = sink.raise(event) {
        warn!("Loopback: {} {:?} not raised: {}", event.profile, event.kind, e);
    }
}

/// Answer `params` with `status` from the addressed node.
fn reply<T: Serialize>(
    sink: &dyn EventSink,
    profile: Profile,
    kind: EventKind,
    params: &ClientParams,
    status: &T,
) {
    let Some(status_opcode) = opcodes::status_opcode(profile, params.opcode) else {
        // Unacknowledged request.
        return;
    };
    match status::encode(status) {
        Ok(bytes) => raise(
            sink,
            RaisedEvent::new(profile, kind, status_opcode)
                .model(params.model)
                .ctx(params.ctx)
                .payload(&bytes),
        ),
        Err(e) => warn!("Loopback: status encode failed: {}", e),
    }
}

fn config_client(cfg: &LoopbackConfig, env: &Envelope, sink: &dyn EventSink) {
    let Action::ConfigClient(call) = &*env.action else {
        return;
    };
    match call {
        ConfigClientCall::GetState { params, .. } if cfg.answers(params.opcode) => {
            reply(sink, Profile::ConfigClient, EventKind::GetState, params, &ByteState { value: 0 });
        }
        ConfigClientCall::SetState { params, set } if cfg.answers(params.opcode) => {
            let value = match set {
                ConfigSetState::Beacon { beacon } => *beacon,
                ConfigSetState::DefaultTtl { ttl } => *ttl,
                ConfigSetState::GattProxy { gatt_proxy } => *gatt_proxy,
                _ => 0,
            };
            reply(sink, Profile::ConfigClient, EventKind::SetState, params, &ByteState { value });
        }
        _ => debug!("Loopback: config request left unanswered"),
    }
}

fn health_client(cfg: &LoopbackConfig, env: &Envelope, sink: &dyn EventSink) {
    let Action::HealthClient(call) = &*env.action else {
        return;
    };
    match call {
        HealthClientCall::GetState { params, get } if cfg.answers(params.opcode) => match get {
            HealthGetState::FaultGet { company_id } => {
                let status = FaultStatus {
                    test_id: 0,
                    company_id: *company_id,
                    faults: heapless::Vec::new(),
                };
                reply(sink, Profile::HealthClient, EventKind::GetState, params, &status);
            }
            HealthGetState::NoArgs => {
                reply(sink, Profile::HealthClient, EventKind::GetState, params, &ByteState { value: 0 });
            }
        },
        HealthClientCall::SetState { params, .. } if cfg.answers(params.opcode) => {
            reply(sink, Profile::HealthClient, EventKind::SetState, params, &ByteState { value: 0 });
        }
        _ => debug!("Loopback: health request left unanswered"),
    }
}

fn time_scene_client(cfg: &LoopbackConfig, env: &Envelope, sink: &dyn EventSink) {
    let Action::TimeSceneClient(call) = &*env.action else {
        return;
    };
    match call {
        TimeSceneClientCall::GetState { params, .. } if cfg.answers(params.opcode) => {
            reply(sink, Profile::TimeSceneClient, EventKind::GetState, params, &ByteState { value: 0 });
        }
        TimeSceneClientCall::SetState { params, set } if cfg.answers(params.opcode) => {
            let value = match set {
                TimeSceneSetState::SceneStore { scene_number }
                | TimeSceneSetState::SceneRecall { scene_number, .. } => *scene_number as u8,
                TimeSceneSetState::Time { subsecond, .. } => *subsecond,
            };
            reply(sink, Profile::TimeSceneClient, EventKind::SetState, params, &ByteState { value });
        }
        _ => debug!("Loopback: time/scene request left unanswered"),
    }
}

fn model_call(cfg: &LoopbackConfig, env: &Envelope, sink: &dyn EventSink) {
    let Action::Model(call) = &*env.action else {
        return;
    };
    match call {
        ModelCall::ClientSend {
            params,
            data,
            response: Some(response),
        } if cfg.answers(params.opcode) => {
            // Echo the body back as the peer's reply.
            raise(
                sink,
                RaisedEvent::new(Profile::Model, EventKind::Operation, *response)
                    .model(params.model)
                    .ctx(params.ctx)
                    .payload(data),
            );
        }
        ModelCall::ServerSend { model, opcode, .. } | ModelCall::Publish { model, opcode, .. } => {
            raise(
                sink,
                RaisedEvent::new(Profile::Model, EventKind::Complete, *opcode).model(*model),
            );
        }
        ModelCall::ClientSend { .. } => debug!("Loopback: model message left unanswered"),
    }
}

// ── Proxy client ──────────────────────────────────────────────

#[derive(Debug, Default)]
struct ProxyState {
    next_handle: ConnHandle,
    /// `conn → (filter type, list size)`
    filters: heapless::LinearMap<ConnHandle, (u8, u16), MAX_CONNECTIONS>,
}

impl ProxyState {
    fn handle(&mut self, env: &Envelope, sink: &dyn EventSink) {
        let Action::ProxyClient(call) = &*env.action else {
            return;
        };
        match call {
            ProxyClientCall::Connect { net_idx, .. } => {
                let conn = self.next_handle;
                if self.filters.insert(conn, (0, 0)).is_err() {
                    warn!("Loopback: too many proxy connections");
                    return;
                }
                self.next_handle = self.next_handle.wrapping_add(1);
                let ctx = MsgCtx {
                    net_idx: *net_idx,
                    ..MsgCtx::default()
                }
                .via(Bearer::Gatt(conn));
                raise(
                    sink,
                    RaisedEvent::new(Profile::ProxyClient, EventKind::Connected, 0).ctx(ctx),
                );
            }
            ProxyClientCall::Disconnect { conn_handle } => {
                self.filters.remove(conn_handle);
                let ctx = MsgCtx::default().via(Bearer::Gatt(*conn_handle));
                raise(
                    sink,
                    RaisedEvent::new(Profile::ProxyClient, EventKind::Disconnected, 0).ctx(ctx),
                );
            }
            ProxyClientCall::SetFilterType {
                conn_handle,
                filter_type,
                ..
            } => {
                if let Some(f) = self.filters.get_mut(conn_handle) {
                    *f = (*filter_type as u8, 0);
                }
                self.filter_status(*conn_handle, sink);
            }
            ProxyClientCall::AddFilterAddr {
                conn_handle, addrs, ..
            } => {
                if let Some(f) = self.filters.get_mut(conn_handle) {
                    f.1 = f.1.saturating_add(addrs.len() as u16);
                }
                self.filter_status(*conn_handle, sink);
            }
            ProxyClientCall::RemoveFilterAddr {
                conn_handle, addrs, ..
            } => {
                if let Some(f) = self.filters.get_mut(conn_handle) {
                    f.1 = f.1.saturating_sub(addrs.len() as u16);
                }
                self.filter_status(*conn_handle, sink);
            }
        }
    }

    fn filter_status(&self, conn: ConnHandle, sink: &dyn EventSink) {
        // No status from a proxy we are not connected to.
        let Some(&(filter_type, list_size)) = self.filters.get(&conn) else {
            return;
        };
        let status = FilterStatus {
            filter_type,
            list_size,
        };
        match status::encode(&status) {
            Ok(bytes) => raise(
                sink,
                RaisedEvent::new(
                    Profile::ProxyClient,
                    EventKind::FilterStatus,
                    opcodes::PROXY_FILTER_STATUS,
                )
                .ctx(MsgCtx::default().via(Bearer::Gatt(conn)))
                .payload(&bytes),
            ),
            Err(e) => warn!("Loopback: filter status encode failed: {}", e),
        }
    }
}

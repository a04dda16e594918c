//! meshbridge-sim: host simulation of the call/event bridge.
//!
//! ```text
//! ┌──────────────┐  submit   ┌──────────────────┐  raise   ┌──────────────┐
//! │  demo calls  │──────────▶│ mesh-stack       │─────────▶│ mesh-app     │
//! │  (main)      │           │ LoopbackStack    │          │ log callbacks│
//! └──────────────┘           └──────────────────┘          └──────────────┘
//! ```
//!
//! Usage: `meshbridge-sim [config.json]`. Log level via `RUST_LOG`.

use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};

use meshbridge::adapters::{log_sink, loopback};
use meshbridge::config::TimeoutOverride;
use meshbridge::mesh::actions::{
    ConfigClientCall, ConfigGetState, ConfigSetState, FilterType, HealthClientCall, HealthGetState,
    ProxyClientCall,
};
use meshbridge::mesh::opcodes;
use meshbridge::mesh::status::{ByteState, FilterStatus};
use meshbridge::mesh::types::{Bearer, ClientParams, ModelHandle, MsgCtx};
use meshbridge::{Action, Bridge, BridgeConfig, EventKind, Profile};

/// Unicast address of the simulated remote node.
const REMOTE_NODE: u16 = 0x0042;

fn load_config() -> Result<BridgeConfig> {
    let Some(path) = std::env::args().nth(1) else {
        let mut config = BridgeConfig::default();
        // Short health timeout so the demo shows the timeout path.
        let _ = config.timeout_overrides.push(TimeoutOverride {
            profile: Profile::HealthClient,
            timeout_ms: 300,
        });
        return Ok(config);
    };
    let json = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    BridgeConfig::from_json(&json).with_context(|| format!("parsing {path}"))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("meshbridge-sim v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    let mut bridge = Bridge::new(config)?;

    // ── Callbacks ─────────────────────────────────────────────
    log_sink::install(&bridge);
    bridge.register_callback(Profile::ConfigClient, |event| {
        log_sink::log_event(event);
        if let Ok(state) = event.decode::<ByteState>() {
            info!("  config status 0x{:04X} = {}", event.opcode, state.value);
        }
    });
    bridge.register_callback(Profile::ProxyClient, |event| {
        log_sink::log_event(event);
        if event.kind == EventKind::FilterStatus {
            if let Ok(status) = event.decode::<FilterStatus>() {
                info!("  proxy filter now holds {} addresses", status.list_size);
            }
        }
    });

    // ── Stack ─────────────────────────────────────────────────
    let mut stack = loopback::LoopbackConfig::default();
    let _ = stack.silent.push(opcodes::HEALTH_PERIOD_GET);
    let _ = stack.silent.push(opcodes::CFG_GATT_PROXY_GET);
    bridge.start(loopback::handlers(&stack))?;

    let pump = bridge
        .take_event_pump()
        .context("event pump already taken")?;
    let worker = pump.spawn()?;

    // ── Demo traffic ──────────────────────────────────────────
    let client = ModelHandle::new(0, 1);
    let ctx = MsgCtx::new(0, 0, REMOTE_NODE);
    let demo = [
        Action::ConfigClient(ConfigClientCall::GetState {
            params: ClientParams::new(opcodes::CFG_BEACON_GET, client, ctx),
            get: ConfigGetState::NoArgs,
        }),
        Action::ConfigClient(ConfigClientCall::SetState {
            params: ClientParams::new(opcodes::CFG_DEFAULT_TTL_SET, client, ctx),
            set: ConfigSetState::DefaultTtl { ttl: 7 },
        }),
        Action::ProxyClient(ProxyClientCall::Connect {
            addr: [0xC0, 0xFF, 0xEE, 0x00, 0x00, 0x01],
            addr_type: 0,
            net_idx: 0,
        }),
        Action::ProxyClient(ProxyClientCall::SetFilterType {
            conn_handle: 0,
            net_idx: 0,
            filter_type: FilterType::Accept,
        }),
        Action::HealthClient(HealthClientCall::GetState {
            params: ClientParams::new(opcodes::HEALTH_PERIOD_GET, client, ctx),
            get: HealthGetState::NoArgs,
        }),
    ];
    for action in &demo {
        match bridge.submit(action) {
            Ok(txn) => info!("submitted {} (txn {:?})", action.profile(), txn.map(|t| t.get())),
            Err(e) => warn!("submit {} failed: {}", action.profile(), e),
        }
    }

    // Filter add travels over the proxy; the GATT-routed get is owned by
    // the same connection and is cancelled when it drops.
    std::thread::sleep(Duration::from_millis(50));
    let filter = Action::ProxyClient(ProxyClientCall::AddFilterAddr {
        conn_handle: 0,
        net_idx: 0,
        addrs: vec![0x0001, 0x0002, 0x0003, 0xC000, 0xC001],
    });
    bridge.submit(&filter)?;
    bridge.submit(&Action::ConfigClient(ConfigClientCall::GetState {
        params: ClientParams::new(opcodes::CFG_GATT_PROXY_GET, client, ctx.via(Bearer::Gatt(0))),
        get: ConfigGetState::NoArgs,
    }))?;
    std::thread::sleep(Duration::from_millis(50));
    bridge.submit(&Action::ProxyClient(ProxyClientCall::Disconnect { conn_handle: 0 }))?;

    // Let the health request time out.
    std::thread::sleep(Duration::from_millis(500));

    let metrics = bridge.metrics();
    info!("metrics: {}", serde_json::to_string(&metrics)?);
    if bridge.registry().outstanding() != 0 {
        warn!("{} argument copies still alive", bridge.registry().outstanding());
    }

    bridge.shutdown();
    worker.stop();
    info!("done");
    Ok(())
}

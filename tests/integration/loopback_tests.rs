//! End-to-end runs against the loopback stack.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use meshbridge::adapters::loopback::{self, LoopbackConfig};
use meshbridge::bridge::events::MeshEvent;
use meshbridge::mesh::actions::{
    ConfigClientCall, ConfigSetState, FilterType, ModelCall, ProxyClientCall, TimeSceneClientCall,
    TimeSceneSetState,
};
use meshbridge::mesh::opcodes;
use meshbridge::mesh::status::{ByteState, FilterStatus};
use meshbridge::{Action, Bridge, BridgeConfig, EventKind, Profile};

use crate::mock_stack::{params, pump_until, record_all, started, wait_until};

#[test]
fn config_set_answered_with_decoded_status() {
    let mut bridge: Bridge = started(
        BridgeConfig::default(),
        loopback::handlers(&LoopbackConfig::default()),
    );
    let decoded: Arc<Mutex<Option<(EventKind, Option<ByteState>)>>> = Arc::default();
    let d = Arc::clone(&decoded);
    bridge.register_callback(Profile::ConfigClient, move |event: &MeshEvent| {
        *d.lock().unwrap() = Some((event.kind, event.decode::<ByteState>().ok()));
    });
    let mut pump = bridge.take_event_pump().unwrap();

    let set = Action::ConfigClient(ConfigClientCall::SetState {
        params: params(opcodes::CFG_DEFAULT_TTL_SET, 0x0020),
        set: ConfigSetState::DefaultTtl { ttl: 11 },
    });
    assert!(bridge.submit(&set).unwrap().is_some());
    assert!(pump.wait_and_dispatch(embassy_time::Duration::from_secs(1)));

    assert_eq!(
        *decoded.lock().unwrap(),
        Some((EventKind::SetState, Some(ByteState { value: 11 })))
    );
    assert_eq!(bridge.pending_count(), 0);
}

#[test]
fn proxy_session_reports_filter_size() {
    let mut bridge: Bridge = started(
        BridgeConfig::default(),
        loopback::handlers(&LoopbackConfig::default()),
    );
    let log = record_all(&bridge);
    let mut pump = bridge.take_event_pump().unwrap();

    let calls = [
        Action::ProxyClient(ProxyClientCall::Connect {
            addr: [1, 2, 3, 4, 5, 6],
            addr_type: 0,
            net_idx: 0,
        }),
        Action::ProxyClient(ProxyClientCall::SetFilterType {
            conn_handle: 0,
            net_idx: 0,
            filter_type: FilterType::Accept,
        }),
    ];
    for call in &calls {
        bridge.submit(call).unwrap();
    }
    assert_eq!(pump_until(&mut pump, &log, 2, Duration::from_secs(1)), 2);

    bridge
        .submit(&Action::ProxyClient(ProxyClientCall::AddFilterAddr {
            conn_handle: 0,
            net_idx: 0,
            addrs: vec![0x0001, 0x0002, 0x0003, 0xC000, 0xC001],
        }))
        .unwrap();
    assert_eq!(pump_until(&mut pump, &log, 3, Duration::from_secs(1)), 3);
    bridge
        .submit(&Action::ProxyClient(ProxyClientCall::Disconnect { conn_handle: 0 }))
        .unwrap();
    assert_eq!(pump_until(&mut pump, &log, 4, Duration::from_secs(1)), 4);

    let log = log.lock().unwrap();
    let kinds: Vec<_> = log.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        [
            EventKind::Connected,
            EventKind::FilterStatus,
            EventKind::FilterStatus,
            EventKind::Disconnected
        ]
    );
    let status: FilterStatus = postcard::from_bytes(&log[2].payload).unwrap();
    assert_eq!(status.list_size, 5);
    assert!(log[1].txn.is_some() && log[2].txn.is_some());
    assert_eq!(bridge.pending_count(), 0);
}

#[test]
fn model_request_echoed_as_operation() {
    let mut bridge: Bridge = started(
        BridgeConfig::default(),
        loopback::handlers(&LoopbackConfig::default()),
    );
    let log = record_all(&bridge);
    let mut pump = bridge.take_event_pump().unwrap();

    let send = Action::Model(ModelCall::ClientSend {
        params: params(0x8201, 0x0033),
        data: vec![0xDE, 0xAD],
        response: Some(0x8204),
    });
    let txn = bridge.submit(&send).unwrap();
    assert_eq!(pump_until(&mut pump, &log, 1, Duration::from_secs(1)), 1);

    let log = log.lock().unwrap();
    assert_eq!(log[0].kind, EventKind::Operation);
    assert_eq!(log[0].opcode, 0x8204);
    assert_eq!(log[0].txn, txn);
    assert_eq!(log[0].payload, [0xDE, 0xAD]);
}

#[test]
fn silent_opcode_times_out() {
    let mut stack = LoopbackConfig::default();
    stack.silent.push(opcodes::SCENE_STORE).unwrap();
    let mut bridge: Bridge = started(BridgeConfig::default(), loopback::handlers(&stack));
    let log = record_all(&bridge);
    let mut pump = bridge.take_event_pump().unwrap();

    let store = Action::TimeSceneClient(TimeSceneClientCall::SetState {
        params: params(opcodes::SCENE_STORE, 0x0044).with_timeout(80),
        set: TimeSceneSetState::SceneStore { scene_number: 3 },
    });
    let txn = bridge.submit(&store).unwrap();
    assert_eq!(pump_until(&mut pump, &log, 1, Duration::from_secs(1)), 1);

    let log = log.lock().unwrap();
    assert_eq!(log[0].kind, EventKind::Timeout);
    assert_eq!(log[0].profile, Profile::TimeSceneClient);
    assert_eq!(log[0].txn, txn);
}

#[test]
fn worker_pump_delivers_and_ledger_balances() {
    let mut bridge: Bridge = started(
        BridgeConfig::default(),
        loopback::handlers(&LoopbackConfig::default()),
    );
    let log = record_all(&bridge);
    let worker = bridge.take_event_pump().unwrap().spawn().unwrap();

    for dst in 1..=8u16 {
        let set = Action::ConfigClient(ConfigClientCall::SetState {
            params: params(opcodes::CFG_BEACON_SET, dst),
            set: ConfigSetState::Beacon { beacon: 1 },
        });
        bridge.submit(&set).unwrap();
    }
    assert!(wait_until(Duration::from_secs(2), || {
        log.lock().unwrap().len() == 8
    }));
    assert!(wait_until(Duration::from_secs(1), || {
        bridge.registry().outstanding() == 0
    }));
    assert_eq!(bridge.registry().clones(), 16);

    bridge.shutdown();
    worker.stop();
}

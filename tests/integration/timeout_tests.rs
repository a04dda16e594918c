//! Event path and pending-request timeouts.

use std::time::{Duration, Instant};

use meshbridge::bridge::pending::PendingState;
use meshbridge::config::TimeoutOverride;
use meshbridge::mesh::actions::{ConfigClientCall, ConfigGetState, HealthClientCall, HealthGetState, ModelCall};
use meshbridge::mesh::opcodes;
use meshbridge::mesh::types::MsgCtx;
use meshbridge::{
    Action, Bridge, BridgeConfig, DispatchError, EventKind, EventSink, Profile, RaisedEvent,
    StackHandlers,
};

use crate::mock_stack::{CLIENT, Recorder, params, pump_until, record_all, started, wait_until};

const NODE: u16 = 0x0105;

fn beacon_get(timeout_ms: u32) -> Action {
    Action::ConfigClient(ConfigClientCall::GetState {
        params: params(opcodes::CFG_BEACON_GET, NODE).with_timeout(timeout_ms),
        get: ConfigGetState::NoArgs,
    })
}

fn beacon_status() -> RaisedEvent<'static> {
    RaisedEvent::new(Profile::ConfigClient, EventKind::GetState, opcodes::CFG_BEACON_STATUS)
        .model(CLIENT)
        .ctx(MsgCtx::new(0, 0, NODE))
        .payload(&[1])
}

#[test]
fn get_without_response_times_out_exactly_once() {
    let rec = Recorder::new();
    let mut bridge: Bridge = started(BridgeConfig::default(), rec.handlers(&[Profile::ConfigClient]));
    let log = record_all(&bridge);
    let mut pump = bridge.take_event_pump().unwrap();

    let start = Instant::now();
    let txn = bridge.submit(&beacon_get(200)).unwrap().unwrap();

    assert_eq!(pump_until(&mut pump, &log, 1, Duration::from_secs(2)), 1);
    {
        let log = log.lock().unwrap();
        let ev = &log[0];
        assert_eq!(ev.kind, EventKind::Timeout);
        assert_eq!(ev.txn, Some(txn));
        assert_eq!(ev.state, Some(PendingState::TimedOut));
        assert_eq!(ev.opcode, opcodes::CFG_BEACON_GET);
        assert!(ev.payload.is_empty());
        assert!(ev.at - start >= Duration::from_millis(190));
    }

    // A late status no longer matches anything and never reaches a callback.
    let sink = bridge.event_sink();
    assert_eq!(sink.raise(beacon_status()), Ok(None));
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(pump.dispatch_pending(), 0);
    assert_eq!(log.lock().unwrap().len(), 1);

    let m = bridge.metrics();
    assert_eq!(m.timeouts, 1);
    assert_eq!(m.stale_responses, 1);
    assert_eq!(bridge.pending_count(), 0);
    assert_eq!(bridge.registry().outstanding(), 0);
}

#[test]
fn response_before_deadline_wins() {
    let handlers = StackHandlers::new().with(Profile::ConfigClient, |_env, sink| {
        sink.raise(beacon_status()).unwrap();
    });
    let mut bridge: Bridge = started(BridgeConfig::default(), handlers);
    let log = record_all(&bridge);
    let mut pump = bridge.take_event_pump().unwrap();

    let txn = bridge.submit(&beacon_get(150)).unwrap().unwrap();
    assert_eq!(pump_until(&mut pump, &log, 1, Duration::from_secs(1)), 1);

    // Past the deadline nothing else shows up.
    assert_eq!(pump_until(&mut pump, &log, 2, Duration::from_millis(400)), 1);
    let log = log.lock().unwrap();
    assert_eq!(log[0].kind, EventKind::GetState);
    assert_eq!(log[0].txn, Some(txn));
    assert_eq!(log[0].state, Some(PendingState::Responded));
    assert_eq!(log[0].payload, [1]);
    assert_eq!(bridge.metrics().timeouts, 0);
}

#[test]
fn profile_override_applies_when_request_has_no_timeout() {
    let rec = Recorder::new();
    let mut config = BridgeConfig::default();
    config
        .timeout_overrides
        .push(TimeoutOverride {
            profile: Profile::HealthClient,
            timeout_ms: 100,
        })
        .unwrap();
    let mut bridge: Bridge = started(config, rec.handlers(&[Profile::HealthClient]));
    let log = record_all(&bridge);
    let mut pump = bridge.take_event_pump().unwrap();

    let start = Instant::now();
    let action = Action::HealthClient(HealthClientCall::GetState {
        params: params(opcodes::HEALTH_FAULT_GET, NODE),
        get: HealthGetState::FaultGet { company_id: 0x02E5 },
    });
    bridge.submit(&action).unwrap();

    assert_eq!(pump_until(&mut pump, &log, 1, Duration::from_secs(2)), 1);
    assert_eq!(log.lock().unwrap()[0].kind, EventKind::Timeout);
    // Well short of the 4 s default.
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn unsolicited_publish_reaches_callback() {
    let rec = Recorder::new();
    let mut bridge: Bridge = started(BridgeConfig::default(), rec.handlers(&[]));
    let log = record_all(&bridge);
    let mut pump = bridge.take_event_pump().unwrap();

    let ev = RaisedEvent::new(Profile::HealthClient, EventKind::Publish, opcodes::HEALTH_FAULT_STATUS)
        .ctx(MsgCtx::new(0, 0, NODE))
        .payload(&[0, 0xE5, 0x02]);
    assert_eq!(bridge.event_sink().raise(ev), Ok(None));

    assert_eq!(pump.dispatch_pending(), 1);
    let log = log.lock().unwrap();
    assert_eq!(log[0].kind, EventKind::Publish);
    assert_eq!(log[0].txn, None);
    assert_eq!(log[0].payload, [0, 0xE5, 0x02]);
}

#[test]
fn unmatched_operation_is_delivered_unsolicited() {
    let rec = Recorder::new();
    let mut bridge: Bridge = started(BridgeConfig::default(), rec.handlers(&[]));
    let log = record_all(&bridge);
    let mut pump = bridge.take_event_pump().unwrap();

    let ev = RaisedEvent::new(Profile::Model, EventKind::Operation, 0x8202).model(CLIENT);
    assert_eq!(bridge.event_sink().raise(ev), Ok(None));
    assert_eq!(pump.dispatch_pending(), 1);
    assert_eq!(log.lock().unwrap()[0].state, None);
}

#[test]
fn operation_answers_model_request() {
    let rec = Recorder::new();
    let mut bridge: Bridge = started(BridgeConfig::default(), rec.handlers(&[Profile::Model]));
    let log = record_all(&bridge);
    let mut pump = bridge.take_event_pump().unwrap();

    let request = Action::Model(ModelCall::ClientSend {
        params: params(0x8201, NODE),
        data: vec![1, 2],
        response: Some(0x8204),
    });
    let txn = bridge.submit(&request).unwrap().unwrap();

    let reply = RaisedEvent::new(Profile::Model, EventKind::Operation, 0x8204)
        .model(CLIENT)
        .ctx(MsgCtx::new(0, 0, NODE));
    assert_eq!(bridge.event_sink().raise(reply), Ok(Some(txn)));
    assert_eq!(pump.dispatch_pending(), 1);
    assert_eq!(log.lock().unwrap()[0].txn, Some(txn));
    assert_eq!(bridge.pending_count(), 0);
}

#[test]
fn synthetic_and_foreign_kinds_rejected() {
    let rec = Recorder::new();
    let bridge: Bridge = started(BridgeConfig::default(), rec.handlers(&[]));
    let sink = bridge.event_sink();

    let timeout = RaisedEvent::new(Profile::ConfigClient, EventKind::Timeout, 0);
    assert_eq!(sink.raise(timeout), Err(DispatchError::UnknownEventType));

    let foreign = RaisedEvent::new(Profile::ConfigServer, EventKind::GetState, 0);
    assert_eq!(sink.raise(foreign), Err(DispatchError::UnknownEventType));
    assert_eq!(bridge.registry().clones(), 0);
}

#[test]
fn raise_after_shutdown_is_not_initialized() {
    let rec = Recorder::new();
    let mut bridge: Bridge = started(BridgeConfig::default(), rec.handlers(&[]));
    let sink = bridge.event_sink();
    bridge.shutdown();
    let ev = RaisedEvent::new(Profile::Model, EventKind::Publish, 1);
    assert_eq!(sink.raise(ev), Err(DispatchError::NotInitialized));
}

#[test]
fn full_event_queue_drops_and_reports() {
    let rec = Recorder::new();
    let mut bridge: Bridge<4, 2> = started(BridgeConfig::default(), rec.handlers(&[]));
    let sink = bridge.event_sink();

    for _ in 0..2 {
        let ev = RaisedEvent::new(Profile::Model, EventKind::Publish, 1).payload(&[7; 8]);
        assert_eq!(sink.raise(ev), Ok(None));
    }
    let ev = RaisedEvent::new(Profile::Model, EventKind::Publish, 1).payload(&[7; 8]);
    assert_eq!(sink.raise(ev), Err(DispatchError::QueueFull));

    assert_eq!(bridge.metrics().events_dropped, 1);
    assert_eq!(bridge.metrics().event_queue_len, 2);
    assert_eq!(bridge.registry().outstanding(), 2);

    bridge.shutdown();
    assert_eq!(bridge.registry().outstanding(), 0);
}

#[test]
fn event_without_callback_is_released() {
    let rec = Recorder::new();
    let mut bridge: Bridge = started(BridgeConfig::default(), rec.handlers(&[]));
    let mut pump = bridge.take_event_pump().unwrap();
    assert!(bridge.take_event_pump().is_none());

    let ev = RaisedEvent::new(Profile::TimeSceneServer, EventKind::StateChange, 0x5E).payload(&[1, 2]);
    bridge.event_sink().raise(ev).unwrap();
    assert_eq!(pump.dispatch_pending(), 1);

    assert_eq!(bridge.metrics().callbacks_missing, 1);
    assert!(wait_until(Duration::from_millis(100), || bridge.registry().outstanding() == 0));
}

#[test]
fn callback_can_be_replaced_at_runtime() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    let rec = Recorder::new();
    let mut bridge: Bridge = started(BridgeConfig::default(), rec.handlers(&[]));
    let mut pump = bridge.take_event_pump().unwrap();
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    let f = Arc::clone(&first);
    bridge.register_callback(Profile::Model, move |_| {
        f.fetch_add(1, Ordering::Relaxed);
    });
    let publish = || RaisedEvent::new(Profile::Model, EventKind::Publish, 1);
    bridge.event_sink().raise(publish()).unwrap();
    pump.dispatch_pending();

    let s = Arc::clone(&second);
    bridge.register_callback(Profile::Model, move |_| {
        s.fetch_add(1, Ordering::Relaxed);
    });
    bridge.event_sink().raise(publish()).unwrap();
    pump.dispatch_pending();

    assert_eq!(first.load(Ordering::Relaxed), 1);
    assert_eq!(second.load(Ordering::Relaxed), 1);
}

#[test]
fn timeout_held_back_by_full_event_queue_is_delivered_later() {
    let rec = Recorder::new();
    let mut bridge: Bridge<4, 1> = started(BridgeConfig::default(), rec.handlers(&[Profile::ConfigClient]));
    let log = record_all(&bridge);
    let mut pump = bridge.take_event_pump().unwrap();

    let publish = RaisedEvent::new(Profile::Model, EventKind::Publish, 1).payload(&[9]);
    assert_eq!(bridge.event_sink().raise(publish), Ok(None));
    let txn = bridge.submit(&beacon_get(50)).unwrap().unwrap();

    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(bridge.pending_count(), 0);
    let m = bridge.metrics();
    assert_eq!(m.timeouts, 1);
    assert_eq!(m.events_dropped, 0);

    assert_eq!(pump_until(&mut pump, &log, 2, Duration::from_secs(1)), 2);
    {
        let log = log.lock().unwrap();
        assert_eq!(log[0].kind, EventKind::Publish);
        assert_eq!(log[1].kind, EventKind::Timeout);
        assert_eq!(log[1].txn, Some(txn));
        assert_eq!(log[1].state, Some(PendingState::TimedOut));
    }
    assert!(wait_until(Duration::from_secs(1), || bridge.registry().outstanding() == 0));
}

//! Mock stack and callback recorder for integration tests.
//!
//! The recording stack captures what each handler observed (including
//! the address of copied buffers, to check for aliasing) and can be held
//! closed by a [`Gate`] to back-pressure the call queue.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use meshbridge::bridge::events::MeshEvent;
use meshbridge::bridge::invoker::EventPump;
use meshbridge::bridge::pending::PendingState;
use meshbridge::mesh::actions::{ModelCall, ProxyClientCall};
use meshbridge::mesh::types::{ClientParams, ModelHandle, MsgCtx};
use meshbridge::{Action, Bridge, BridgeConfig, EventKind, Profile, StackHandlers, TxnId};

// ── What the stack saw ────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Seen {
    pub profile: Profile,
    pub seq: u32,
    pub txn: Option<TxnId>,
    pub addrs: Vec<u16>,
    pub addrs_ptr: usize,
    pub data: Vec<u8>,
}

// ── Gate ──────────────────────────────────────────────────────

/// Holds the stack handler until opened. `entered` counts handler calls
/// that reached the gate.
#[derive(Clone, Default)]
pub struct Gate {
    inner: Arc<(Mutex<(bool, usize)>, Condvar)>,
}

#[allow(dead_code)]
impl Gate {
    pub fn closed() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        let (lock, cv) = &*self.inner;
        lock.lock().unwrap().0 = true;
        cv.notify_all();
    }

    fn pass(&self) {
        let (lock, cv) = &*self.inner;
        let mut state = lock.lock().unwrap();
        state.1 += 1;
        cv.notify_all();
        while !state.0 {
            state = cv.wait(state).unwrap();
        }
    }

    /// Wait until `n` handler calls have reached the gate.
    pub fn wait_entered(&self, n: usize) {
        let (lock, cv) = &*self.inner;
        let state = lock.lock().unwrap();
        let (_state, timeout) = cv
            .wait_timeout_while(state, Duration::from_secs(2), |s| s.1 < n)
            .unwrap();
        assert!(!timeout.timed_out(), "handler never reached the gate");
    }
}

// ── Recording stack ───────────────────────────────────────────

#[derive(Clone, Default)]
pub struct Recorder {
    pub seen: Arc<Mutex<Vec<Seen>>>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handlers for `profiles` that record and never answer.
    pub fn handlers(&self, profiles: &[Profile]) -> StackHandlers {
        self.gated_handlers(profiles, None)
    }

    pub fn gated_handlers(&self, profiles: &[Profile], gate: Option<Gate>) -> StackHandlers {
        let mut handlers = StackHandlers::new();
        for &profile in profiles {
            let seen = Arc::clone(&self.seen);
            let gate = gate.clone();
            handlers.insert(profile, move |env, _sink| {
                if let Some(gate) = &gate {
                    gate.pass();
                }
                let (addrs, addrs_ptr, data) = match &*env.action {
                    Action::ProxyClient(
                        ProxyClientCall::AddFilterAddr { addrs, .. }
                        | ProxyClientCall::RemoveFilterAddr { addrs, .. },
                    ) => (addrs.clone(), addrs.as_ptr() as usize, Vec::new()),
                    Action::Model(
                        ModelCall::ClientSend { data, .. }
                        | ModelCall::ServerSend { data, .. }
                        | ModelCall::Publish { data, .. },
                    ) => (Vec::new(), 0, data.clone()),
                    _ => (Vec::new(), 0, Vec::new()),
                };
                seen.lock().unwrap().push(Seen {
                    profile: env.profile(),
                    seq: env.seq,
                    txn: env.txn,
                    addrs,
                    addrs_ptr,
                    data,
                });
            });
        }
        handlers
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn snapshot(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn wait_for(&self, n: usize) {
        assert!(
            wait_until(Duration::from_secs(2), || self.len() >= n),
            "stack saw {} of {} calls",
            self.len(),
            n
        );
    }
}

// ── Callback recorder ─────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Delivered {
    pub profile: Profile,
    pub kind: EventKind,
    pub opcode: u32,
    pub txn: Option<TxnId>,
    pub state: Option<PendingState>,
    pub payload: Vec<u8>,
    pub at: Instant,
}

pub type Log = Arc<Mutex<Vec<Delivered>>>;

/// Register a recording callback for every profile.
pub fn record_all<const C: usize, const E: usize>(bridge: &Bridge<C, E>) -> Log {
    let log: Log = Arc::default();
    for profile in Profile::ALL {
        let log = Arc::clone(&log);
        bridge.register_callback(profile, move |event: &MeshEvent| {
            log.lock().unwrap().push(Delivered {
                profile: event.profile,
                kind: event.kind,
                opcode: event.opcode,
                txn: event.txn(),
                state: event.request.map(|r| r.state),
                payload: event.payload().to_vec(),
                at: Instant::now(),
            });
        });
    }
    log
}

/// Drive `pump` until `log` holds at least `n` entries or `timeout`.
#[allow(dead_code)]
pub fn pump_until<const C: usize, const E: usize>(
    pump: &mut EventPump<C, E>,
    log: &Log,
    n: usize,
    timeout: Duration,
) -> usize {
    let deadline = Instant::now() + timeout;
    while log.lock().unwrap().len() < n {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        pump.wait_and_dispatch(embassy_time::Duration::from_micros(
            (deadline - now).as_micros() as u64,
        ));
    }
    log.lock().unwrap().len()
}

pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

// ── Fixtures ──────────────────────────────────────────────────

pub const CLIENT: ModelHandle = ModelHandle::new(0, 1);

pub fn params(opcode: u32, dst: u16) -> ClientParams {
    ClientParams::new(opcode, CLIENT, MsgCtx::new(0, 0, dst))
}

#[allow(dead_code)]
pub fn publish(byte: u8) -> Action {
    Action::Model(ModelCall::Publish {
        model: ModelHandle::new(0, 0),
        opcode: 0xC0_0001,
        data: vec![byte; 4],
    })
}

#[allow(dead_code)]
pub fn started<const C: usize, const E: usize>(
    config: BridgeConfig,
    handlers: StackHandlers,
) -> Bridge<C, E> {
    let mut bridge = Bridge::<C, E>::with_queues(config).unwrap();
    bridge.start(handlers).unwrap();
    bridge
}

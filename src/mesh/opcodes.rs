//! Request → status opcode pairs.
//!
//! A client request is acknowledged when the profile's table holds a
//! status opcode for it. Unacknowledged requests (e.g. `*_SET_UNACK`)
//! have no entry and never create a pending-request record.
//!
//! Proxy configuration opcodes live in their own space (they travel in
//! proxy PDUs, not access messages), hence the per-profile lookup.

use super::Profile;

// ── Configuration model ──────────────────────────────────────
pub const CFG_APP_KEY_ADD: u32 = 0x00;
pub const CFG_COMPOSITION_DATA_STATUS: u32 = 0x02;
pub const CFG_APP_KEY_STATUS: u32 = 0x8003;
pub const CFG_COMPOSITION_DATA_GET: u32 = 0x8008;
pub const CFG_BEACON_GET: u32 = 0x8009;
pub const CFG_BEACON_SET: u32 = 0x800A;
pub const CFG_BEACON_STATUS: u32 = 0x800B;
pub const CFG_DEFAULT_TTL_GET: u32 = 0x800C;
pub const CFG_DEFAULT_TTL_SET: u32 = 0x800D;
pub const CFG_DEFAULT_TTL_STATUS: u32 = 0x800E;
pub const CFG_GATT_PROXY_GET: u32 = 0x8012;
pub const CFG_GATT_PROXY_SET: u32 = 0x8013;
pub const CFG_GATT_PROXY_STATUS: u32 = 0x8014;
pub const CFG_MODEL_SUB_ADD: u32 = 0x801B;
pub const CFG_MODEL_SUB_DELETE: u32 = 0x801C;
pub const CFG_MODEL_SUB_STATUS: u32 = 0x801F;
pub const CFG_SIG_MODEL_SUB_GET: u32 = 0x8029;
pub const CFG_SIG_MODEL_SUB_LIST: u32 = 0x802A;
pub const CFG_NODE_RESET: u32 = 0x8049;
pub const CFG_NODE_RESET_STATUS: u32 = 0x804A;

// ── Health model ─────────────────────────────────────────────
pub const HEALTH_FAULT_STATUS: u32 = 0x05;
pub const HEALTH_ATTENTION_GET: u32 = 0x8004;
pub const HEALTH_ATTENTION_SET: u32 = 0x8005;
pub const HEALTH_ATTENTION_SET_UNACK: u32 = 0x8006;
pub const HEALTH_ATTENTION_STATUS: u32 = 0x8007;
pub const HEALTH_FAULT_CLEAR: u32 = 0x802F;
pub const HEALTH_FAULT_CLEAR_UNACK: u32 = 0x8030;
pub const HEALTH_FAULT_GET: u32 = 0x8031;
pub const HEALTH_FAULT_TEST: u32 = 0x8032;
pub const HEALTH_FAULT_TEST_UNACK: u32 = 0x8033;
pub const HEALTH_PERIOD_GET: u32 = 0x8034;
pub const HEALTH_PERIOD_SET: u32 = 0x8035;
pub const HEALTH_PERIOD_SET_UNACK: u32 = 0x8036;
pub const HEALTH_PERIOD_STATUS: u32 = 0x8037;

// ── Time and scenes ──────────────────────────────────────────
pub const TIME_SET: u32 = 0x5C;
pub const TIME_STATUS: u32 = 0x5D;
pub const SCENE_STATUS: u32 = 0x5E;
pub const TIME_GET: u32 = 0x8237;
pub const SCENE_GET: u32 = 0x8241;
pub const SCENE_RECALL: u32 = 0x8242;
pub const SCENE_RECALL_UNACK: u32 = 0x8243;
pub const SCENE_REGISTER_GET: u32 = 0x8244;
pub const SCENE_REGISTER_STATUS: u32 = 0x8245;
pub const SCENE_STORE: u32 = 0x8246;
pub const SCENE_STORE_UNACK: u32 = 0x8247;

// ── Proxy configuration ──────────────────────────────────────
pub const PROXY_SET_FILTER_TYPE: u32 = 0x00;
pub const PROXY_ADD_ADDR: u32 = 0x01;
pub const PROXY_REMOVE_ADDR: u32 = 0x02;
pub const PROXY_FILTER_STATUS: u32 = 0x03;

const CONFIG_PAIRS: &[(u32, u32)] = &[
    (CFG_APP_KEY_ADD, CFG_APP_KEY_STATUS),
    (CFG_COMPOSITION_DATA_GET, CFG_COMPOSITION_DATA_STATUS),
    (CFG_BEACON_GET, CFG_BEACON_STATUS),
    (CFG_BEACON_SET, CFG_BEACON_STATUS),
    (CFG_DEFAULT_TTL_GET, CFG_DEFAULT_TTL_STATUS),
    (CFG_DEFAULT_TTL_SET, CFG_DEFAULT_TTL_STATUS),
    (CFG_GATT_PROXY_GET, CFG_GATT_PROXY_STATUS),
    (CFG_GATT_PROXY_SET, CFG_GATT_PROXY_STATUS),
    (CFG_MODEL_SUB_ADD, CFG_MODEL_SUB_STATUS),
    (CFG_MODEL_SUB_DELETE, CFG_MODEL_SUB_STATUS),
    (CFG_SIG_MODEL_SUB_GET, CFG_SIG_MODEL_SUB_LIST),
    (CFG_NODE_RESET, CFG_NODE_RESET_STATUS),
];

const HEALTH_PAIRS: &[(u32, u32)] = &[
    (HEALTH_ATTENTION_GET, HEALTH_ATTENTION_STATUS),
    (HEALTH_ATTENTION_SET, HEALTH_ATTENTION_STATUS),
    (HEALTH_FAULT_CLEAR, HEALTH_FAULT_STATUS),
    (HEALTH_FAULT_GET, HEALTH_FAULT_STATUS),
    (HEALTH_FAULT_TEST, HEALTH_FAULT_STATUS),
    (HEALTH_PERIOD_GET, HEALTH_PERIOD_STATUS),
    (HEALTH_PERIOD_SET, HEALTH_PERIOD_STATUS),
];

const TIME_SCENE_PAIRS: &[(u32, u32)] = &[
    (TIME_GET, TIME_STATUS),
    (TIME_SET, TIME_STATUS),
    (SCENE_GET, SCENE_STATUS),
    (SCENE_RECALL, SCENE_STATUS),
    (SCENE_STORE, SCENE_REGISTER_STATUS),
    (SCENE_REGISTER_GET, SCENE_REGISTER_STATUS),
];

const PROXY_PAIRS: &[(u32, u32)] = &[
    (PROXY_SET_FILTER_TYPE, PROXY_FILTER_STATUS),
    (PROXY_ADD_ADDR, PROXY_FILTER_STATUS),
    (PROXY_REMOVE_ADDR, PROXY_FILTER_STATUS),
];

/// Status opcode that acknowledges `request` for `profile`, or `None`
/// for unacknowledged requests and profiles without a client role.
pub fn status_opcode(profile: Profile, request: u32) -> Option<u32> {
    let table = match profile {
        Profile::ConfigClient => CONFIG_PAIRS,
        Profile::HealthClient => HEALTH_PAIRS,
        Profile::TimeSceneClient => TIME_SCENE_PAIRS,
        Profile::ProxyClient => PROXY_PAIRS,
        _ => return None,
    };
    table
        .iter()
        .find(|(req, _)| *req == request)
        .map(|(_, status)| *status)
}

//! Bridge configuration parameters
//!
//! All tunables for the call/event bridge. Values can be loaded from a
//! JSON document (`BridgeConfig::from_json`) or left at their defaults.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::mesh::Profile;
use crate::task_pin::Core;

/// Maximum number of per-profile timeout overrides.
pub const MAX_TIMEOUT_OVERRIDES: usize = 8;

/// What `submit` does when the call queue is saturated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueFullPolicy {
    /// Fail immediately with `QueueFull`.
    #[default]
    Reject,
    /// Wait up to `submit_timeout_ms` for space, then fail with `QueueFull`.
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutOverride {
    pub profile: Profile,
    pub timeout_ms: u32,
}

/// Placement of a worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub core: Core,
    pub priority: u8,
    pub stack_kb: usize,
}

/// Core bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    // --- Call queue ---
    pub queue_full_policy: QueueFullPolicy,
    /// Upper bound on a blocking submit (milliseconds)
    pub submit_timeout_ms: u32,

    // --- Pending requests ---
    /// Response timeout when neither the request nor an override sets one
    pub response_timeout_ms: u32,
    /// Per-profile response timeouts
    pub timeout_overrides: heapless::Vec<TimeoutOverride, MAX_TIMEOUT_OVERRIDES>,

    // --- Deep copy ---
    /// Bytes a single action or event payload copy may allocate
    pub clone_byte_budget: usize,

    // --- Workers ---
    pub stack_task: TaskConfig,
    pub app_task: TaskConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            queue_full_policy: QueueFullPolicy::Reject,
            submit_timeout_ms: 100,

            response_timeout_ms: 4000,
            timeout_overrides: heapless::Vec::new(),

            clone_byte_budget: 4096,

            // Stack work shares the protocol core with the BLE controller.
            stack_task: TaskConfig {
                core: Core::Pro,
                priority: 20,
                stack_kb: 8,
            },
            app_task: TaskConfig {
                core: Core::App,
                priority: 10,
                stack_kb: 8,
            },
        }
    }
}

impl BridgeConfig {
    /// Parse and validate a JSON document. Missing fields keep defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.response_timeout_ms == 0 {
            return Err(ConfigError::Invalid("response_timeout_ms must be non-zero"));
        }
        if self.queue_full_policy == QueueFullPolicy::Block && self.submit_timeout_ms == 0 {
            return Err(ConfigError::Invalid("submit_timeout_ms must be non-zero when blocking"));
        }
        if self.clone_byte_budget == 0 {
            return Err(ConfigError::Invalid("clone_byte_budget must be non-zero"));
        }
        for (i, o) in self.timeout_overrides.iter().enumerate() {
            if o.timeout_ms == 0 {
                return Err(ConfigError::Invalid("timeout override must be non-zero"));
            }
            if self.timeout_overrides[..i].iter().any(|p| p.profile == o.profile) {
                return Err(ConfigError::Invalid("duplicate timeout override"));
            }
        }
        for task in [&self.stack_task, &self.app_task] {
            if task.stack_kb < 2 {
                return Err(ConfigError::Invalid("worker stack below 2KB"));
            }
        }
        Ok(())
    }

    /// Timeout for a request: the request's own value, then the profile
    /// override, then the default.
    pub fn response_timeout(&self, profile: Profile, requested_ms: u32) -> u32 {
        if requested_ms != 0 {
            return requested_ms;
        }
        self.timeout_overrides
            .iter()
            .find(|o| o.profile == profile)
            .map_or(self.response_timeout_ms, |o| o.timeout_ms)
    }
}

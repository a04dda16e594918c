//! Core-pinned worker spawning for the bridge's two contexts.
//!
//! Wraps `esp_pthread_set_cfg()` so that `std::thread::Builder::spawn`
//! creates a FreeRTOS task pinned to a specific CPU core with explicit
//! priority and stack size. On non-ESP targets, falls back to a plain
//! named thread.
//!
//! # ESP-IDF Threading Model
//!
//! `esp_pthread_set_cfg()` sets thread-local configuration that applies
//! to the *next* `pthread_create()` call from the calling thread, so the
//! config→spawn pair must not be interleaved with other thread creation
//! on the same thread.

use serde::{Deserialize, Serialize};

use crate::config::TaskConfig;
use crate::error::Error;

/// CPU core identifiers for the ESP32 dual-core parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum Core {
    /// Core 0 (PRO_CPU): BLE controller and host stack.
    Pro = 0,
    /// Core 1 (APP_CPU): application callbacks.
    App = 1,
}

/// Spawn a worker according to `task`. The `name` must be
/// null-terminated (e.g. `"mesh-stack\0"`).
#[cfg(target_os = "espidf")]
pub fn spawn_on_core(
    task: &TaskConfig,
    name: &'static str,
    f: impl FnOnce() + Send + 'static,
) -> Result<std::thread::JoinHandle<()>, Error> {
    let display_name = name.trim_end_matches('\0');
    // SAFETY: `cfg` outlives the call and `name` is a static
    // null-terminated string.
    let ret = unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = task.core as i32;
        cfg.prio = task.priority as i32;
        cfg.stack_size = (task.stack_kb * 1024) as i32;
        cfg.thread_name = name.as_ptr() as *const _;
        esp_idf_sys::esp_pthread_set_cfg(&cfg)
    };
    if ret != esp_idf_sys::ESP_OK as i32 {
        log::error!("esp_pthread_set_cfg failed for '{}': {}", display_name, ret);
        return Err(Error::Spawn(display_name));
    }

    log::info!(
        "Spawning '{}' on {:?} (pri={}, stack={}KB)",
        display_name,
        task.core,
        task.priority,
        task.stack_kb
    );

    std::thread::Builder::new()
        .name(display_name.into())
        .spawn(f)
        .map_err(|_| Error::Spawn(display_name))
}

/// Host fallback: ignores core affinity and priority.
#[cfg(not(target_os = "espidf"))]
pub fn spawn_on_core(
    task: &TaskConfig,
    name: &'static str,
    f: impl FnOnce() + Send + 'static,
) -> Result<std::thread::JoinHandle<()>, Error> {
    let display_name = name.trim_end_matches('\0');
    log::debug!(
        "Spawning '{}' (host, no core pinning, stack={}KB)",
        display_name,
        task.stack_kb
    );

    std::thread::Builder::new()
        .name(display_name.into())
        .stack_size(task.stack_kb * 1024)
        .spawn(f)
        .map_err(|_| Error::Spawn(display_name))
}

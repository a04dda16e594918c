//! Integration test driver for `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises one path through the
//! bridge against the mock or loopback stack. All tests run on the host
//! with real worker threads.

#![cfg(not(target_os = "espidf"))]

mod loopback_tests;
mod mock_stack;
mod timeout_tests;

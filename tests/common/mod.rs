//! Common test utilities and helpers
//!
//! This module provides shared functionality used across integration tests:
//! - Binary path resolution (via `get_weld_binary`)
//! - Source fixtures and a recording toolchain (via `helpers`)

pub(crate) mod helpers;

// Re-export get_weld_binary for convenient access
#[allow(unused_imports)]
pub(crate) use helpers::get_weld_binary;

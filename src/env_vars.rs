//! Toolchain and weld environment variable handling.

use std::env;

// Helper for boolean environment variables that accept "1", "true", "yes"
fn is_enabled(var: &str) -> bool {
    env::var(var).ok().is_some_and(|s| {
        let s = s.to_lowercase();
        s == "1" || s == "true" || s == "yes"
    })
}

// Build tool configuration
// These are read once and handed to the toolchain as an explicit value.

/// Get C++ compiler override (`CXX`).
pub fn cxx() -> Option<String> {
    env::var("CXX").ok()
}

/// Get extra C++ compiler flags (`CXXFLAGS`), split on whitespace.
pub fn cxxflags() -> Vec<String> {
    split_flags("CXXFLAGS")
}

/// Get extra linker flags (`LDFLAGS`), split on whitespace.
pub fn ldflags() -> Vec<String> {
    split_flags("LDFLAGS")
}

fn split_flags(var: &str) -> Vec<String> {
    env::var(var)
        .map(|flags| flags.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Get the Python interpreter used for host discovery (`PYTHON`).
pub fn python() -> Option<String> {
    env::var("PYTHON").ok()
}

// weld behavior

/// Get build directory override (`WELD_BUILD_DIR`).
pub fn weld_build_dir() -> Option<String> {
    env::var("WELD_BUILD_DIR").ok()
}

/// Check whether the build cache is disabled (`WELD_NO_CACHE`).
pub fn weld_no_cache() -> bool {
    is_enabled("WELD_NO_CACHE")
}

/// Check whether debug output is requested (`WELD_DEBUG`).
pub fn weld_debug() -> bool {
    is_enabled("WELD_DEBUG")
}

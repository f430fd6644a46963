//! Debug logging utilities
//!
//! Debug output is gated by the global `--debug` flag (or `WELD_DEBUG`).
//! When debug mode is disabled, all debug logging has zero cost.

use std::sync::OnceLock;

static DEBUG_ENABLED: OnceLock<bool> = OnceLock::new();

/// Initialize debug mode from the command-line flag and `WELD_DEBUG`
pub fn init_debug(enabled: bool) {
    let _ = DEBUG_ENABLED.set(enabled || crate::env_vars::weld_debug());
}

/// Check if debug mode is enabled
pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED.get().copied().unwrap_or(false)
}

/// Macro for convenient debug logging
///
/// Usage: `debug!("scanned {} types", count)`
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        if $crate::debug::is_debug_enabled() {
            eprintln!("[DEBUG] {}", format_args!($($arg)*));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_does_not_panic_when_uninitialized() {
        assert!(!is_debug_enabled() || crate::env_vars::weld_debug());
        crate::debug!("formatted {}", 42);
    }
}

//! Platform file suffixes
//!
//! The suffixes the host runtime and the compiler expect on this platform.

/// File suffix of a loadable extension module on this platform
#[must_use]
pub const fn extension_suffix() -> &'static str {
    if cfg!(windows) { ".pyd" } else { ".so" }
}

/// File suffix of a compiled object on this platform
#[must_use]
pub const fn object_suffix() -> &'static str {
    if cfg!(windows) { ".obj" } else { ".o" }
}

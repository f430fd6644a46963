//! Command implementations

pub(crate) mod build;
pub(crate) mod clean;
pub(crate) mod completion;
pub(crate) mod render;
pub(crate) mod scan;

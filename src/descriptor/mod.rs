//! Module descriptors
//!
//! Structured intent recovered from source text:
//! module -> types -> {methods, properties, protocol slots}, and
//! module -> free functions. Descriptors are rebuilt from source on every
//! build and never persisted.

pub mod assemble;
pub mod slots;
pub mod types;

pub use assemble::{Assembly, FREE_FUNCTION_PREFIX, ScopedKind, assemble, assemble_source};
pub use slots::{ProtocolSlots, Slot, SlotCategory, SlotSpec};
pub use types::{
    CallingConvention, DeclMap, MethodDescriptor, ModuleDescriptor, ModuleFunctionDescriptor,
    PropertyDescriptor, TypeDescriptor,
};

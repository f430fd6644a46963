//! Descriptor type definitions
//!
//! The in-memory model of one extension module: its types with their
//! methods, properties and protocol slots, plus its free functions. Every
//! table keeps entries in first-declaration order.

use super::slots::ProtocolSlots;
use std::collections::HashMap;

/// Calling convention of a bound method or free function.
///
/// Derived purely from the number of parameters after the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallingConvention {
    /// No arguments besides the receiver
    NoArgs,
    /// Positional argument tuple
    Positional,
    /// Positional tuple plus keyword dictionary
    PositionalKeyword,
}

impl CallingConvention {
    /// Classify a parameter list by its arity (receiver excluded).
    ///
    /// Returns `None` when no convention accepts that many parameters.
    #[must_use]
    pub const fn from_arity(arity: usize) -> Option<Self> {
        match arity {
            0 => Some(Self::NoArgs),
            1 => Some(Self::Positional),
            2 => Some(Self::PositionalKeyword),
            _ => None,
        }
    }

    /// Flag expression written into method table entries
    #[must_use]
    pub const fn flag(self) -> &'static str {
        match self {
            Self::NoArgs => "METH_NOARGS",
            Self::Positional => "METH_VARARGS",
            Self::PositionalKeyword => "METH_VARARGS | METH_KEYWORDS",
        }
    }
}

/// Insertion-ordered table keyed by declaration name.
///
/// Re-inserting an existing key replaces the value but keeps the position
/// of the first declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclMap<T> {
    entries: Vec<(String, T)>,
    index: HashMap<String, usize>,
}

impl<T> Default for DeclMap<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> DeclMap<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace, returning the replaced value
    pub fn insert(&mut self, key: impl Into<String>, value: T) -> Option<T> {
        let key = key.into();
        if let Some(slot) = self
            .index
            .get(&key)
            .and_then(|&position| self.entries.get_mut(position))
        {
            return Some(std::mem::replace(&mut slot.1, value));
        }

        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        None
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&T> {
        self.index
            .get(key)
            .and_then(|&position| self.entries.get(position))
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut T> {
        self.index
            .get(key)
            .and_then(|&position| self.entries.get_mut(position))
            .map(|(_, value)| value)
    }

    /// Get the entry for `key`, inserting `make()` at the end if absent
    pub fn get_or_insert_with(&mut self, key: &str, make: impl FnOnce() -> T) -> Option<&mut T> {
        let position = match self.index.get(key) {
            Some(&position) => position,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), make()));
                self.entries.len() - 1
            }
        };

        self.entries.get_mut(position).map(|(_, value)| value)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, value)| value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A bound method (`<Type>_meth_<name>`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Name exposed to Python
    pub name: String,
    /// Owning type; `None` only for free functions wrapped as methods
    pub owner: Option<String>,
    /// C symbol implementing the method
    pub function: String,
    pub convention: CallingConvention,
    pub line: usize,
}

/// A property assembled from `<Type>_get_<name>` / `<Type>_set_<name>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub name: String,
    pub getter: Option<String>,
    pub setter: Option<String>,
}

impl PropertyDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            getter: None,
            setter: None,
        }
    }
}

/// An exported type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub name: String,
    /// Record declaration as written
    pub header: String,
    pub methods: DeclMap<MethodDescriptor>,
    pub properties: DeclMap<PropertyDescriptor>,
    pub slots: ProtocolSlots,
    pub line: usize,
}

impl TypeDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, header: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            header: header.into(),
            methods: DeclMap::new(),
            properties: DeclMap::new(),
            slots: ProtocolSlots::default(),
            line,
        }
    }

    /// C symbol of the type record
    #[must_use]
    pub fn record_symbol(&self) -> String {
        format!("{}_Type", self.name)
    }
}

/// A module-level function (`meth_<name>`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleFunctionDescriptor {
    pub name: String,
    pub function: String,
    pub convention: CallingConvention,
    pub line: usize,
}

impl ModuleFunctionDescriptor {
    /// Exported alias the module unit links against
    #[must_use]
    pub fn export_symbol(&self) -> String {
        format!("__meth_{}", self.name)
    }
}

/// One extension module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub name: String,
    pub types: DeclMap<TypeDescriptor>,
    pub functions: DeclMap<ModuleFunctionDescriptor>,
}

impl ModuleDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: DeclMap::new(),
            functions: DeclMap::new(),
        }
    }

    /// Fold another fragment's declarations into this module.
    ///
    /// Later fragments win on name conflicts.
    pub fn merge(&mut self, other: Self) {
        for (name, descriptor) in other.types.entries {
            self.types.insert(name, descriptor);
        }
        for (name, descriptor) in other.functions.entries {
            self.functions.insert(name, descriptor);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.functions.is_empty()
    }
}
